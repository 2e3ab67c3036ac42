//! Classification of link-bearing blocks into dedicated embeds.

use url::Url;

const SOCIAL_HOSTS: [&str; 2] = ["x.com", "twitter.com"];
const VIDEO_HOSTS: [&str; 2] = ["youtube.com", "youtube-nocookie.com"];
const SHORT_VIDEO_HOST: &str = "youtu.be";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbedTarget {
    /// A post on a social network, identified by the trailing path segment.
    SocialPost { id: String },
    Video { id: String },
    Link,
}

pub fn classify(raw_url: &str) -> EmbedTarget {
    let Ok(url) = Url::parse(raw_url.trim()) else {
        return EmbedTarget::Link;
    };
    let Some(host) = url.host_str().map(str::to_ascii_lowercase) else {
        return EmbedTarget::Link;
    };

    if host_matches(&host, &SOCIAL_HOSTS) {
        return trailing_segment(&url)
            .map(|id| EmbedTarget::SocialPost { id })
            .unwrap_or(EmbedTarget::Link);
    }

    if host_matches(&host, &[SHORT_VIDEO_HOST]) {
        return trailing_segment(&url)
            .map(|id| EmbedTarget::Video { id })
            .unwrap_or(EmbedTarget::Link);
    }

    if host_matches(&host, &VIDEO_HOSTS) {
        return url
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
            .filter(|id| !id.is_empty())
            .map(|id| EmbedTarget::Video { id })
            .unwrap_or(EmbedTarget::Link);
    }

    EmbedTarget::Link
}

fn host_matches(host: &str, candidates: &[&str]) -> bool {
    candidates.iter().any(|candidate| {
        host == *candidate
            || host
                .strip_suffix(candidate)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// Last path segment with the query string dropped. No further validation.
fn trailing_segment(url: &Url) -> Option<String> {
    url.path_segments()?
        .next_back()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}
