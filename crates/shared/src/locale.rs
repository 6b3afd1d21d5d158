//! Localized UI strings consumed by the heading builder and the list panel.

pub struct LocalizedStrings {
    pub loading: &'static str,
    pub search_placeholder: &'static str,
    pub show_list: &'static str,
    pub hide_list: &'static str,
    pub intro_label: &'static str,
    pub readers: &'static str,
    pub year: &'static str,
    pub authors: &'static str,
    pub title: &'static str,
    pub area: &'static str,
}

pub const ENG: LocalizedStrings = LocalizedStrings {
    loading: "Loading...",
    search_placeholder: "Search...",
    show_list: "Show list",
    hide_list: "Hide list",
    intro_label: "What's this?",
    readers: "readers",
    year: "date",
    authors: "authors",
    title: "title",
    area: "Area",
};

pub const GER: LocalizedStrings = LocalizedStrings {
    loading: "Wird geladen...",
    search_placeholder: "Suche...",
    show_list: "Liste ausklappen",
    hide_list: "Liste einklappen",
    intro_label: "Was ist das?",
    readers: "Leser",
    year: "Jahr",
    authors: "Autor",
    title: "Titel",
    area: "Bereich",
};

pub const ENG_PLOS: LocalizedStrings = LocalizedStrings {
    loading: "Loading...",
    search_placeholder: "Search...",
    show_list: "Show list",
    hide_list: "Hide list",
    intro_label: "What's this?",
    readers: "views",
    year: "date",
    authors: "authors",
    title: "title",
    area: "Area",
};

/// Unknown language codes fall back to English.
pub fn strings(language: &str) -> &'static LocalizedStrings {
    match language {
        "ger" => &GER,
        "eng_plos" => &ENG_PLOS,
        _ => &ENG,
    }
}

/// Default heading when no explicit title is configured.
pub fn default_heading(language: &str, article_count: usize) -> String {
    match language {
        "ger" => format!("Überblick über {article_count} Artikel"),
        _ => format!("Overview of {article_count} articles"),
    }
}
