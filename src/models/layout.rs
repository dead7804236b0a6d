//! Home layout slot types and their per-slot payloads.
//!
//! `layout_type` is stored as its own column; `layout_data` is a tagged
//! variant whose `kind` must agree with the layout type.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::image::ImageData;

/// Stride between rows in `display_order`.
pub const ROW_STRIDE: i32 = 1000;

/// Encode a home slot position.
pub fn display_order(row_index: usize, position_in_row: usize) -> i32 {
    (row_index as i32) * ROW_STRIDE + position_in_row as i32
}

/// Closed set of home-grid slot types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayoutType {
    #[serde(rename = "1_full")]
    OneFull,
    #[serde(rename = "2_articles")]
    TwoArticles,
    #[serde(rename = "3_articles")]
    ThreeArticles,
    #[serde(rename = "5_articles")]
    FiveArticles,
    #[serde(rename = "1_special_bg")]
    OneSpecialBg,
    #[serde(rename = "1_with_list_left")]
    OneWithListLeft,
    #[serde(rename = "1_with_list_right")]
    OneWithListRight,
    #[serde(rename = "slider")]
    Slider,
    #[serde(rename = "job_slider")]
    JobSlider,
}

/// Payload shape a layout type carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    Card,
    WithList,
    Slider,
}

impl LayoutType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneFull => "1_full",
            Self::TwoArticles => "2_articles",
            Self::ThreeArticles => "3_articles",
            Self::FiveArticles => "5_articles",
            Self::OneSpecialBg => "1_special_bg",
            Self::OneWithListLeft => "1_with_list_left",
            Self::OneWithListRight => "1_with_list_right",
            Self::Slider => "slider",
            Self::JobSlider => "job_slider",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "1_full" => Some(Self::OneFull),
            "2_articles" => Some(Self::TwoArticles),
            "3_articles" => Some(Self::ThreeArticles),
            "5_articles" => Some(Self::FiveArticles),
            "1_special_bg" => Some(Self::OneSpecialBg),
            "1_with_list_left" => Some(Self::OneWithListLeft),
            "1_with_list_right" => Some(Self::OneWithListRight),
            "slider" => Some(Self::Slider),
            "job_slider" => Some(Self::JobSlider),
            _ => None,
        }
    }

    pub fn kind(&self) -> LayoutKind {
        match self {
            Self::OneWithListLeft | Self::OneWithListRight => LayoutKind::WithList,
            Self::Slider | Self::JobSlider => LayoutKind::Slider,
            _ => LayoutKind::Card,
        }
    }

    pub fn is_slider(&self) -> bool {
        self.kind() == LayoutKind::Slider
    }

    /// Nominal number of cards the slot holds (sliders hold a variable count).
    pub fn cardinality(&self) -> Option<usize> {
        match self {
            Self::OneFull
            | Self::OneSpecialBg
            | Self::OneWithListLeft
            | Self::OneWithListRight => Some(1),
            Self::TwoArticles => Some(2),
            Self::ThreeArticles => Some(3),
            Self::FiveArticles => Some(5),
            Self::Slider | Self::JobSlider => None,
        }
    }

    /// Layout implied by a `large-N` grid class.
    pub fn from_grid_size(size: u8) -> Option<Self> {
        match size {
            12 => Some(Self::OneFull),
            4 => Some(Self::ThreeArticles),
            5..=8 => Some(Self::TwoArticles),
            _ => None,
        }
    }

    /// Layout implied by the number of cards in a plain row.
    pub fn from_card_count(count: usize) -> Option<Self> {
        match count {
            2 => Some(Self::TwoArticles),
            3 => Some(Self::ThreeArticles),
            5 => Some(Self::FiveArticles),
            _ => None,
        }
    }
}

impl fmt::Display for LayoutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One segment of a headline. Spans keep their class list as the colour key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitlePart {
    pub text: String,
    pub color_class: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderLink {
    pub text: String,
    pub url: String,
}

/// An item inside a slider container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliderArticle {
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kicker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageData>,
    #[serde(default)]
    pub is_paywall: bool,
}

/// Placement and decoration of a single card.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardLayout {
    pub row_index: usize,
    pub position_in_row: usize,
    #[serde(default)]
    pub title_parts: Vec<TitlePart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kicker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kicker_floating: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kicker_below: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kicker_below_classes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_class: Option<String>,
}

/// A card with an adjacent link list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListLayout {
    pub card: CardLayout,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_title: Option<String>,
    #[serde(default)]
    pub list_items: Vec<ListItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SliderLayout {
    pub row_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slider_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_link: Option<HeaderLink>,
    #[serde(default)]
    pub slider_articles: Vec<SliderArticle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_class: Option<String>,
}

/// The `layout_data` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutData {
    Card(CardLayout),
    WithList(ListLayout),
    Slider(SliderLayout),
}

impl LayoutData {
    pub fn kind(&self) -> LayoutKind {
        match self {
            Self::Card(_) => LayoutKind::Card,
            Self::WithList(_) => LayoutKind::WithList,
            Self::Slider(_) => LayoutKind::Slider,
        }
    }

    /// Whether this payload is valid for the given layout type.
    pub fn fits(&self, layout_type: LayoutType) -> bool {
        self.kind() == layout_type.kind()
    }

    pub fn row_index(&self) -> usize {
        match self {
            Self::Card(c) => c.row_index,
            Self::WithList(l) => l.card.row_index,
            Self::Slider(s) => s.row_index,
        }
    }

    /// Move the payload to another slot, keeping its content.
    pub fn set_position(&mut self, row_index: usize, position_in_row: usize) {
        match self {
            Self::Card(c) => {
                c.row_index = row_index;
                c.position_in_row = position_in_row;
            }
            Self::WithList(l) => {
                l.card.row_index = row_index;
                l.card.position_in_row = position_in_row;
            }
            Self::Slider(s) => s.row_index = row_index,
        }
    }

    pub fn card(&self) -> Option<&CardLayout> {
        match self {
            Self::Card(c) => Some(c),
            Self::WithList(l) => Some(&l.card),
            Self::Slider(_) => None,
        }
    }
}
