//! Menu catalog for the register.
//!
//! The menu is fetched once at start-up from `getMenu` and never edited
//! locally. A failed fetch leaves the register running with an empty catalog.

use tracing::{error, info, warn};

use crate::api::{MenuSections, RemoteEndpoint};
use crate::models::{MenuCategory, MenuItem};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuSection {
    pub key: String,
    pub items: Vec<MenuItem>,
}

impl MenuSection {
    /// Known category for this section, if the key is one of the standard ones.
    pub fn category(&self) -> Option<MenuCategory> {
        MenuCategory::DISPLAY_ORDER
            .into_iter()
            .find(|c| c.as_key() == self.key)
    }

    pub fn label(&self) -> &str {
        match self.category() {
            Some(category) => category.label(),
            None => &self.key,
        }
    }
}

/// Menu sections in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuCatalog {
    sections: Vec<MenuSection>,
}

impl MenuCatalog {
    /// Arrange sections: the standard categories first in display order,
    /// then any other keys in sorted order.
    pub fn from_sections(mut raw: MenuSections) -> Self {
        let mut sections = Vec::with_capacity(raw.len());
        for category in MenuCategory::DISPLAY_ORDER {
            if let Some(items) = raw.remove(category.as_key()) {
                sections.push(MenuSection {
                    key: category.as_key().to_string(),
                    items,
                });
            }
        }
        for (key, items) in raw {
            warn!(category = %key, items = items.len(), "menu has non-standard category");
            sections.push(MenuSection { key, items });
        }
        Self { sections }
    }

    pub fn sections(&self) -> &[MenuSection] {
        &self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.items.is_empty())
    }

    pub fn item_count(&self) -> usize {
        self.sections.iter().map(|s| s.items.len()).sum()
    }

    /// Look an item up by id across every section.
    pub fn find(&self, item_id: &str) -> Option<&MenuItem> {
        self.sections
            .iter()
            .flat_map(|s| s.items.iter())
            .find(|item| item.id == item_id)
    }
}

/// Fetch the menu. Returns an empty catalog on any failure.
pub async fn load_menu<E: RemoteEndpoint + ?Sized>(endpoint: &E) -> MenuCatalog {
    match endpoint.get_menu().await {
        Ok(sections) => {
            let catalog = MenuCatalog::from_sections(sections);
            info!(
                sections = catalog.sections().len(),
                items = catalog.item_count(),
                "menu loaded"
            );
            catalog
        }
        Err(e) => {
            error!(error = %e, "menu load failed, continuing with empty menu");
            MenuCatalog::default()
        }
    }
}
