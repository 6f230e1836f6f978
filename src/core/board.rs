use crate::domain::model::{Cafeteria, Menu, UNAVAILABLE_MESSAGE};
use crate::domain::ports::MenuProvider;
use crate::utils::error::{MenuError, Result};
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub const BOARD_HEADER: &str = "Вот меню на сегодня.";

/// Renders the combined message. A missing menu is shown as unavailable.
pub fn render_board(sections: &[(Cafeteria, Option<Menu>)]) -> String {
    let mut message = String::from(BOARD_HEADER);
    message.push('\n');

    for (cafeteria, menu) in sections {
        let body = match menu {
            Some(menu) => menu.to_string(),
            None => UNAVAILABLE_MESSAGE.to_string(),
        };
        // String 寫入不會失敗
        let _ = write!(message, "\n{}:\n{}\n", cafeteria.title(), body.trim_end());
    }
    message
}

/// Today's menus for several cafeterias in one chat message.
pub struct MenuBoard {
    provider: Arc<dyn MenuProvider>,
    cafeterias: Vec<Cafeteria>,
}

impl MenuBoard {
    pub fn new(provider: Arc<dyn MenuProvider>, cafeterias: Vec<Cafeteria>) -> Self {
        Self {
            provider,
            cafeterias,
        }
    }

    /// Loads every cafeteria concurrently; a failing one degrades to the
    /// unavailable message instead of failing the whole board.
    pub async fn compose(&self, cancel: &CancellationToken) -> Result<String> {
        let mut tasks = JoinSet::new();
        for &cafeteria in &self.cafeterias {
            let provider = self.provider.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move { (cafeteria, provider.get_menu(cafeteria, &cancel).await) });
        }

        let mut menus = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((cafeteria, Ok(menu))) => {
                    menus.insert(cafeteria, menu);
                }
                Ok((_, Err(MenuError::Cancelled))) => return Err(MenuError::Cancelled),
                Ok((cafeteria, Err(e))) => {
                    tracing::warn!(%cafeteria, error = %e, "Menu unavailable, showing fallback");
                }
                Err(e) => tracing::error!(error = %e, "Board task aborted"),
            }
        }

        let sections: Vec<(Cafeteria, Option<Menu>)> = self
            .cafeterias
            .iter()
            .map(|cafeteria| (*cafeteria, menus.remove(cafeteria)))
            .collect();
        Ok(render_board(&sections))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::HOLIDAY_MESSAGE;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    struct FixedProvider;

    #[async_trait]
    impl MenuProvider for FixedProvider {
        async fn get_menu(&self, cafeteria: Cafeteria, _cancel: &CancellationToken) -> Result<Menu> {
            let day = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
            match cafeteria {
                Cafeteria::Peony => Ok(Menu::from_dishes(["김치찌개", "밥"], day)),
                Cafeteria::Azilea => Err(MenuError::Structure {
                    message: "no foodList".to_string(),
                }),
            }
        }
    }

    #[test]
    fn test_render_board_layout() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 8).unwrap();
        let text = render_board(&[
            (Cafeteria::Peony, Some(Menu::from_dishes(["국밥"], day))),
            (Cafeteria::Azilea, Some(Menu::empty(HOLIDAY_MESSAGE, day))),
        ]);

        assert_eq!(
            text,
            "Вот меню на сегодня.\n\nPeony (нижняя):\n1) 국밥\n\nAzilea (верхняя):\nСегодня тут пусто\n"
        );
    }

    #[tokio::test]
    async fn test_failing_cafeteria_degrades() {
        let board = MenuBoard::new(Arc::new(FixedProvider), Cafeteria::ALL.to_vec());

        let text = board.compose(&CancellationToken::new()).await.unwrap();

        assert!(text.contains("Peony (нижняя):\n1) 김치찌개\n2) 밥\n"));
        assert!(text.ends_with(&format!("Azilea (верхняя):\n{}\n", UNAVAILABLE_MESSAGE)));
    }
}
