// Image reference strategies.
//
// Deployments differ in where intersection layout images live: older sites
// embed Google Drive sharing links in the CSV, newer ones ship a directory
// of local images named after the location id. Both are modeled behind one
// trait and picked via configuration.
use crate::config::{ImageConfig, ImageMode};
use std::path::PathBuf;
use tracing::warn;

pub trait ImageResolver {
    /// Produce an image reference for a row, or `None` when there is none.
    /// Never fails: a bad link is a cosmetic problem, not a load problem.
    fn resolve(&self, location_id: &str, raw_url: Option<&str>) -> Option<String>;
}

pub fn resolver_from(cfg: &ImageConfig) -> Box<dyn ImageResolver> {
    match cfg.mode {
        ImageMode::Remote => Box::new(DriveLinkResolver),
        ImageMode::Local => Box::new(LocalImageResolver::new(
            cfg.local_dir.clone(),
            cfg.extension.clone(),
        )),
    }
}

const SHARING_HOST: &str = "drive.google.com";

/// Converts Drive sharing links into directly embeddable view URLs.
pub struct DriveLinkResolver;

impl DriveLinkResolver {
    /// `https://drive.google.com/file/d/<id>/view?...` →
    /// `https://drive.google.com/uc?export=view&id=<id>`.
    ///
    /// Values without the sharing-host marker yield `None` silently (most
    /// rows simply have no link). A marker match whose id cannot be
    /// extracted is logged as a warning.
    pub fn canonicalize(link: &str) -> Option<String> {
        if link.is_empty() || !link.contains(SHARING_HOST) {
            return None;
        }
        let file_id = link
            .split_once("/d/")
            .and_then(|(_, rest)| rest.split_once("/view"))
            .map(|(id, _)| id)
            .filter(|id| !id.is_empty());
        match file_id {
            Some(id) => Some(format!("https://{}/uc?export=view&id={}", SHARING_HOST, id)),
            None => {
                warn!(link, "failed to convert drive link");
                None
            }
        }
    }
}

impl ImageResolver for DriveLinkResolver {
    fn resolve(&self, _location_id: &str, raw_url: Option<&str>) -> Option<String> {
        Self::canonicalize(raw_url?.trim())
    }
}

/// Derives deterministic `loc<ID>.<ext>` paths under a local image
/// directory, independent of anything in the CSV's URL column.
pub struct LocalImageResolver {
    dir: PathBuf,
    extension: String,
}

impl LocalImageResolver {
    pub fn new(dir: PathBuf, extension: String) -> Self {
        LocalImageResolver { dir, extension }
    }
}

impl ImageResolver for LocalImageResolver {
    fn resolve(&self, location_id: &str, _raw_url: Option<&str>) -> Option<String> {
        let trimmed = location_id.trim();
        if trimmed.is_empty() {
            return None;
        }
        // Ids appear both bare ("12") and prefixed ("LOC12"); normalize to
        // one spelling before building the file name.
        let stem = match trimmed.get(..3) {
            Some(prefix) if prefix.eq_ignore_ascii_case("loc") => &trimmed[3..],
            _ => trimmed,
        };
        let file_name = format!("loc{}.{}", stem, self.extension);
        Some(self.dir.join(file_name).display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sharing_link_becomes_direct_view_url() {
        let link = "https://drive.google.com/file/d/ABC123/view?usp=sharing";
        assert_eq!(
            DriveLinkResolver::canonicalize(link),
            Some("https://drive.google.com/uc?export=view&id=ABC123".to_string())
        );
    }

    #[test]
    fn non_links_yield_none() {
        assert_eq!(DriveLinkResolver::canonicalize("not a url"), None);
        assert_eq!(DriveLinkResolver::canonicalize(""), None);
        assert_eq!(
            DriveLinkResolver::canonicalize("https://example.com/d/ABC/view"),
            None
        );
        assert_eq!(DriveLinkResolver.resolve("12", None), None);
    }

    #[test]
    fn malformed_sharing_links_yield_none() {
        // Marker present but no extractable id segment.
        assert_eq!(
            DriveLinkResolver::canonicalize("https://drive.google.com/open?id=ABC123"),
            None
        );
        assert_eq!(
            DriveLinkResolver::canonicalize("https://drive.google.com/file/d/ABC123/edit"),
            None
        );
        assert_eq!(
            DriveLinkResolver::canonicalize("https://drive.google.com/file/d//view"),
            None
        );
    }

    #[test]
    fn local_paths_normalize_the_loc_prefix() {
        let resolver = LocalImageResolver::new(PathBuf::from("images"), "jpg".to_string());
        assert_eq!(resolver.resolve("12", None), Some("images/loc12.jpg".to_string()));
        assert_eq!(resolver.resolve("LOC12", None), Some("images/loc12.jpg".to_string()));
        assert_eq!(resolver.resolve("Loc7", Some("ignored")), Some("images/loc7.jpg".to_string()));
        assert_eq!(resolver.resolve("", None), None);
    }

    #[test]
    fn config_picks_the_strategy() {
        let remote = resolver_from(&ImageConfig::default());
        assert_eq!(
            remote.resolve("12", Some("https://drive.google.com/file/d/XYZ/view")),
            Some("https://drive.google.com/uc?export=view&id=XYZ".to_string())
        );

        let local = resolver_from(&ImageConfig {
            mode: ImageMode::Local,
            ..ImageConfig::default()
        });
        assert_eq!(local.resolve("12", Some("whatever")), Some("images/loc12.jpg".to_string()));
    }
}
