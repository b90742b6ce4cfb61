//! The static manifest of cacheable URLs.
//!
//! Entries are grouped by resource class and may be absolute or root-relative.
//! The same registry value is handed to the controller and to every page.

use std::path::Path;

use figment::{
    Figment,
    providers::{Format, Toml},
};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Manifest of URLs eligible for caching, partitioned by resource class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRegistry {
    #[serde(default)]
    pub pages: Vec<String>,
    #[serde(default)]
    pub styles: Vec<String>,
    #[serde(default)]
    pub scripts: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub external: Vec<String>,
}

impl Default for PathRegistry {
    fn default() -> Self {
        let owned = |paths: &[&str]| paths.iter().map(|p| p.to_string()).collect::<Vec<_>>();
        Self {
            pages: owned(&["/", "/index.html", "/about/index.html"]),
            styles: owned(&["/style.css", "/about/style.css"]),
            scripts: owned(&[
                "/about/script.js",
                "/src/js/script.js",
                "/src/js/slides.js",
                "/src/js/caching/cache-paths.js",
                "/src/js/caching/cache-messaging.js",
            ]),
            images: owned(&[
                "/assets/images/pj_logo.png",
                "/assets/images/landing_bg.jpg",
                "/about/assets/images/zeldalord.png",
                "/about/assets/images/pixel.png",
                "/about/assets/images/kuudraloremaster.png",
                "/about/assets/images/reclipse.png",
                "/about/assets/images/zilla.png",
                "/about/assets/images/flop.png",
                "/about/assets/images/uwudwagon.png",
                "/about/assets/images/sqrt.png",
                "/about/assets/images/about_background.png",
            ]),
            external: owned(&[
                "https://fonts.googleapis.com/icon?family=Material+Icons",
                "https://fonts.googleapis.com/css2?family=DM+Mono:ital,wght@0,300;0,400;0,500;1,300;1,400;1,500&family=Inter:ital,opsz,wght@0,14..32,100..900;1,14..32,100..900&display=swap",
            ]),
        }
    }
}

impl PathRegistry {
    /// An empty manifest.
    pub fn empty() -> Self {
        Self { pages: vec![], styles: vec![], scripts: vec![], images: vec![], external: vec![] }
    }

    /// Load a manifest from a TOML file with the five named arrays.
    ///
    /// Missing arrays default to empty.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        Figment::from(Toml::file(path.as_ref()))
            .extract()
            .map_err(|e| Error::Manifest(e.to_string()))
    }

    /// Every entry: pages, styles, scripts, images, external, duplicates preserved.
    pub fn all_paths(&self) -> Vec<String> {
        self.pages
            .iter()
            .chain(&self.styles)
            .chain(&self.scripts)
            .chain(&self.images)
            .chain(&self.external)
            .cloned()
            .collect()
    }

    /// Total number of entries across all classes.
    pub fn len(&self) -> usize {
        self.pages.len() + self.styles.len() + self.scripts.len() + self.images.len() + self.external.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// URLs pre-populated at install: pages, styles and scripts, minus any entry
    /// containing one of `exclude` (the page-side messaging script would otherwise
    /// depend on itself).
    pub fn install_set(&self, exclude: &[String]) -> Vec<String> {
        self.pages
            .iter()
            .chain(&self.styles)
            .chain(&self.scripts)
            .filter(|path| !exclude.iter().any(|needle| path.contains(needle.as_str())))
            .cloned()
            .collect()
    }

    /// Resources belonging to a named section: every page, style, script and
    /// image whose path contains `section`.
    pub fn section_paths(&self, section: &str) -> Vec<String> {
        self.pages
            .iter()
            .chain(&self.styles)
            .chain(&self.scripts)
            .chain(&self.images)
            .filter(|path| path.contains(section))
            .cloned()
            .collect()
    }

    /// Resources of the home page: pages, styles and scripts outside all
    /// `sections`. The root page `/` is always included.
    pub fn home_paths(&self, sections: &[String]) -> Vec<String> {
        let outside = |path: &&String| !sections.iter().any(|s| path.contains(s.as_str()));
        let pages = self.pages.iter().filter(|p| p.as_str() == "/" || outside(p));
        pages
            .chain(self.styles.iter().filter(outside))
            .chain(self.scripts.iter().filter(outside))
            .cloned()
            .collect()
    }
}
