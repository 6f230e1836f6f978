use crate::domain::ports::HtmlExtractor;
use regex::Regex;

/// Regex-based extractor for the university cafeteria pages.
///
/// Every weekday is rendered as `<ul class="foodList">` with one
/// `class="foodItem"` element per dish.
#[derive(Debug, Clone)]
pub struct FoodListExtractor {
    list_re: Regex,
    item_re: Regex,
}

impl FoodListExtractor {
    pub fn new() -> Self {
        Self {
            list_re: Regex::new(r#"(?sU)<ul class="foodList">(.*)</ul>"#)
                .expect("foodList pattern is valid"),
            item_re: Regex::new(r#"(?sU)class="foodItem">(.*)<"#)
                .expect("foodItem pattern is valid"),
        }
    }
}

impl Default for FoodListExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlExtractor for FoodListExtractor {
    fn food_lists(&self, markup: &str) -> Vec<String> {
        self.list_re
            .captures_iter(markup)
            .map(|caps| caps[1].to_string())
            .collect()
    }

    fn food_items(&self, section: &str) -> Vec<String> {
        self.item_re
            .captures_iter(section)
            .map(|caps| decode_entities(caps[1].trim()))
            .filter(|dish| !dish.is_empty())
            .collect()
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}
