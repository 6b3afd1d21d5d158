use std::path::Path;

use recommend::RecommendParams;
use serde::Deserialize;
use shared::domain::{DatasetDescriptor, GroupId, InputFormat, UserId};

/// Runtime configuration for the explorer. Every field has a default so a
/// missing or partial settings file still yields a usable instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub title: String,
    pub language: String,

    pub min_width: f64,
    pub min_height: f64,
    pub max_height: f64,
    pub bubble_min_scale: f64,
    pub bubble_max_scale: f64,
    pub paper_min_scale: f64,
    pub paper_max_scale: f64,

    pub is_force_areas: bool,
    pub area_force_alpha: f64,

    pub show_timeline: bool,
    pub show_dropdown: bool,
    pub show_intro: bool,
    pub show_infolink: bool,
    pub show_titlerow: bool,
    pub show_list: bool,

    pub sort_options: Vec<String>,
    pub is_content_based: bool,

    pub input_format: InputFormat,
    pub data_dir: String,
    pub revision_endpoint: String,

    pub is_adaptive: bool,
    pub recommendation_endpoint: String,
    pub user_id: i64,
    pub group_ids: Vec<i64>,
    pub max_recommendations: u32,

    pub is_evaluation: bool,
    pub evaluation_endpoint: String,

    pub images_path: String,
    pub preview_type: String,

    pub datasets: Vec<DatasetDescriptor>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            title: String::new(),
            language: "eng".to_string(),

            min_width: 600.0,
            min_height: 600.0,
            max_height: 1000.0,
            bubble_min_scale: 1.0,
            bubble_max_scale: 1.0,
            paper_min_scale: 1.0,
            paper_max_scale: 1.0,

            is_force_areas: false,
            area_force_alpha: 0.02,

            show_timeline: true,
            show_dropdown: true,
            show_intro: false,
            show_infolink: true,
            show_titlerow: true,
            show_list: false,

            sort_options: vec![
                "readers".to_string(),
                "title".to_string(),
                "authors".to_string(),
                "year".to_string(),
            ],
            is_content_based: false,

            input_format: InputFormat::Tabular,
            data_dir: "./data".to_string(),
            revision_endpoint: String::new(),

            is_adaptive: false,
            recommendation_endpoint: String::new(),
            user_id: 0,
            group_ids: Vec::new(),
            max_recommendations: 10,

            is_evaluation: false,
            evaluation_endpoint: String::new(),

            images_path: "./images".to_string(),
            preview_type: "images".to_string(),

            datasets: Vec::new(),
        }
    }
}

impl Settings {
    /// Sort options actually offered by the list panel. Content-based runs
    /// replace the configured set with relevance-oriented keys.
    pub fn normalized_sort_options(&self) -> Vec<String> {
        if self.is_content_based {
            vec!["title".to_string(), "area".to_string()]
        } else {
            self.sort_options.clone()
        }
    }

    pub fn recommend_params(&self) -> RecommendParams {
        RecommendParams {
            user_id: UserId(self.user_id),
            group_ids: self.group_ids.iter().copied().map(GroupId).collect(),
            max_recommendations: self.max_recommendations,
        }
    }
}

/// Loads settings from a TOML file, falling back to defaults when the file
/// is absent or malformed, then applies environment overrides.
pub fn load_settings(path: impl AsRef<Path>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = std::fs::read_to_string(path) {
        if let Ok(parsed) = toml::from_str::<Settings>(&raw) {
            settings = parsed;
        }
    }

    if let Ok(language) =
        std::env::var("EXPLORER_LANGUAGE").or_else(|_| std::env::var("APP__LANGUAGE"))
    {
        settings.language = language;
    }
    if let Ok(data_dir) =
        std::env::var("EXPLORER_DATA_DIR").or_else(|_| std::env::var("APP__DATA_DIR"))
    {
        settings.data_dir = data_dir;
    }
    if let Ok(endpoint) = std::env::var("EXPLORER_REVISION_ENDPOINT")
        .or_else(|_| std::env::var("APP__REVISION_ENDPOINT"))
    {
        settings.revision_endpoint = endpoint;
    }
    if let Ok(endpoint) = std::env::var("EXPLORER_RECOMMENDATION_ENDPOINT")
        .or_else(|_| std::env::var("APP__RECOMMENDATION_ENDPOINT"))
    {
        settings.recommendation_endpoint = endpoint;
    }
    if let Ok(raw) = std::env::var("EXPLORER_MAX_RECOMMENDATIONS")
        .or_else(|_| std::env::var("APP__MAX_RECOMMENDATIONS"))
    {
        if let Ok(value) = raw.parse::<u32>() {
            settings.max_recommendations = value;
        }
    }

    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write as _;

    #[test]
    fn defaults_describe_a_standalone_overview() {
        let settings = Settings::default();
        assert_eq!(settings.language, "eng");
        assert_eq!(settings.min_width, 600.0);
        assert_eq!(settings.min_height, 600.0);
        assert_eq!(settings.max_height, 1000.0);
        assert_eq!(settings.input_format, InputFormat::Tabular);
        assert!(!settings.is_adaptive);
        assert!(!settings.is_evaluation);
        assert!(settings.show_timeline);
        assert!(!settings.show_list);
        assert_eq!(
            settings.sort_options,
            vec!["readers", "title", "authors", "year"]
        );
        assert!(settings.datasets.is_empty());
    }

    #[test]
    fn partial_file_keeps_unmentioned_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
language = "ger"
show_list = true
input_format = "remote_json"

[[datasets]]
title = "Educational Technology"
source = "edu-tech"
"#
        )
        .unwrap();

        let settings = load_settings(file.path());
        assert_eq!(settings.language, "ger");
        assert!(settings.show_list);
        assert_eq!(settings.input_format, InputFormat::RemoteJson);
        assert_eq!(settings.datasets.len(), 1);
        assert_eq!(settings.datasets[0].title, "Educational Technology");
        // Unmentioned fields stay at their defaults.
        assert_eq!(settings.min_width, 600.0);
        assert_eq!(settings.preview_type, "images");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = load_settings("/nonexistent/explorer.toml");
        assert_eq!(settings.language, "eng");
        assert_eq!(settings.input_format, InputFormat::Tabular);
    }

    #[test]
    fn content_based_runs_sort_by_relevance() {
        let settings = Settings {
            is_content_based: true,
            ..Settings::default()
        };
        assert_eq!(settings.normalized_sort_options(), vec!["title", "area"]);

        let regular = Settings::default();
        assert_eq!(regular.normalized_sort_options(), regular.sort_options);
    }

    #[test]
    fn recommend_params_mirror_the_adaptive_fields() {
        let settings = Settings {
            user_id: 7,
            group_ids: vec![4, 5],
            max_recommendations: 3,
            ..Settings::default()
        };
        let params = settings.recommend_params();
        assert_eq!(params.user_id, UserId(7));
        assert_eq!(params.group_ids, vec![GroupId(4), GroupId(5)]);
        assert_eq!(params.max_recommendations, 3);
    }

    #[test]
    fn environment_overrides_win_over_the_file() {
        std::env::set_var("EXPLORER_DATA_DIR", "/srv/explorer/data");
        std::env::set_var("APP__MAX_RECOMMENDATIONS", "25");
        let settings = load_settings("/nonexistent/explorer.toml");
        std::env::remove_var("EXPLORER_DATA_DIR");
        std::env::remove_var("APP__MAX_RECOMMENDATIONS");

        assert_eq!(settings.data_dir, "/srv/explorer/data");
        assert_eq!(settings.max_recommendations, 25);
    }
}
