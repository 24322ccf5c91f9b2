/// A selectable book font.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontOption {
    pub id: &'static str,
    pub name: &'static str,
    pub family: &'static str,
}

pub const FONT_OPTIONS: [FontOption; 6] = [
    FontOption {
        id: "ancient-scroll",
        name: "Ancient Scroll",
        family: "EB Garamond",
    },
    FontOption {
        id: "gothic-wisdom",
        name: "Gothic Wisdom",
        family: "UnifrakturMaguntia",
    },
    FontOption {
        id: "royal-decree",
        name: "Royal Decree",
        family: "Cinzel",
    },
    FontOption {
        id: "elder-script",
        name: "Elder Script",
        family: "Crimson Text",
    },
    FontOption {
        id: "sacred-text",
        name: "Sacred Text",
        family: "Cormorant Garamond",
    },
    FontOption {
        id: "decorative-wisdom",
        name: "Decorative Wisdom",
        family: "Cinzel Decorative",
    },
];

pub fn font_option(id: &str) -> Option<&'static FontOption> {
    FONT_OPTIONS.iter().find(|f| f.id == id)
}

/// Font family for a font id, EB Garamond when unknown.
pub fn font_family(id: &str) -> &'static str {
    font_option(id).map_or(FONT_OPTIONS[0].family, |f| f.family)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DEFAULT_FONT;

    #[test]
    fn unknown_font_falls_back() {
        assert_eq!(font_family("royal-decree"), "Cinzel");
        assert_eq!(font_family("comic-sans"), "EB Garamond");
        assert_eq!(font_family(DEFAULT_FONT), "EB Garamond");
    }
}
