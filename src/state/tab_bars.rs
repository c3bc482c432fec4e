use crate::error::DocumentError;

pub const MAIN_TAB_BAR_ID: &str = "main";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabBar {
    id: String,
    document_ids: Vec<String>,
    active_document_id: Option<String>,
}

impl TabBar {
    fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            document_ids: Vec::new(),
            active_document_id: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn document_ids(&self) -> &[String] {
        &self.document_ids
    }

    pub fn active_document_id(&self) -> Option<&str> {
        self.active_document_id.as_deref()
    }

    pub fn contains(&self, document_id: &str) -> bool {
        self.position(document_id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.document_ids.is_empty()
    }

    fn position(&self, document_id: &str) -> Option<usize> {
        self.document_ids.iter().position(|id| id == document_id)
    }

    /// Active pointer is `None` or a member of the list.
    pub fn invariant_holds(&self) -> bool {
        let unique = self
            .document_ids
            .iter()
            .enumerate()
            .all(|(index, id)| !self.document_ids[..index].contains(id));
        let active_ok = self
            .active_document_id
            .as_ref()
            .map_or(true, |active| self.document_ids.contains(active));
        unique && active_ok
    }
}

/// Panes of open documents. Bars are never removed; an emptied bar stays
/// registered and inert.
#[derive(Debug, Clone)]
pub struct TabBarRegistry {
    bars: Vec<TabBar>,
    active_tab_bar_id: String,
    next_split_id: usize,
}

impl Default for TabBarRegistry {
    fn default() -> Self {
        Self {
            bars: vec![TabBar::new(MAIN_TAB_BAR_ID)],
            active_tab_bar_id: MAIN_TAB_BAR_ID.to_string(),
            next_split_id: 1,
        }
    }
}

impl TabBarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bars(&self) -> &[TabBar] {
        &self.bars
    }

    pub fn get(&self, tab_bar_id: &str) -> Option<&TabBar> {
        self.bars.iter().find(|bar| bar.id == tab_bar_id)
    }

    pub fn active_tab_bar_id(&self) -> &str {
        &self.active_tab_bar_id
    }

    pub fn active_tab_bar(&self) -> &TabBar {
        // The active id always names a registered bar: bars are never removed
        // and only registered ids are ever made active.
        self.get(&self.active_tab_bar_id)
            .unwrap_or_else(|| &self.bars[0])
    }

    pub fn focus(&mut self, tab_bar_id: &str) -> Result<(), DocumentError> {
        self.bar_mut(tab_bar_id)?;
        self.active_tab_bar_id = tab_bar_id.to_string();
        Ok(())
    }

    /// Adds `document_id` to the bar (once) and makes it the active tab.
    /// Returns true when the document was not already in this bar.
    pub fn open(&mut self, tab_bar_id: &str, document_id: &str) -> Result<bool, DocumentError> {
        let bar = self.bar_mut(tab_bar_id)?;
        let added = !bar.contains(document_id);
        if added {
            bar.document_ids.push(document_id.to_string());
        }
        bar.active_document_id = Some(document_id.to_string());
        Ok(added)
    }

    /// Removes the tab. When it was active, selection moves to the right
    /// neighbour, else the left one, else nothing.
    pub fn close(&mut self, tab_bar_id: &str, document_id: &str) -> Result<(), DocumentError> {
        let bar = self.bar_mut(tab_bar_id)?;
        let Some(index) = bar.position(document_id) else {
            return Err(DocumentError::NotInTabBar {
                tab_bar_id: tab_bar_id.to_string(),
                document_id: document_id.to_string(),
            });
        };

        bar.document_ids.remove(index);
        if bar.active_document_id.as_deref() == Some(document_id) {
            bar.active_document_id = bar
                .document_ids
                .get(index)
                .or_else(|| index.checked_sub(1).and_then(|left| bar.document_ids.get(left)))
                .cloned();
        }
        Ok(())
    }

    pub fn activate(&mut self, tab_bar_id: &str, document_id: &str) -> Result<(), DocumentError> {
        let bar = self.bar_mut(tab_bar_id)?;
        if !bar.contains(document_id) {
            return Err(DocumentError::NotInTabBar {
                tab_bar_id: tab_bar_id.to_string(),
                document_id: document_id.to_string(),
            });
        }
        bar.active_document_id = Some(document_id.to_string());
        Ok(())
    }

    /// Creates a new bar holding only `document_id` and makes it the active bar.
    /// The source bar must currently list the document.
    pub fn split(
        &mut self,
        source_tab_bar_id: &str,
        document_id: &str,
    ) -> Result<String, DocumentError> {
        let source = self
            .get(source_tab_bar_id)
            .ok_or_else(|| DocumentError::UnknownTabBar(source_tab_bar_id.to_string()))?;
        if !source.contains(document_id) {
            return Err(DocumentError::NotInTabBar {
                tab_bar_id: source_tab_bar_id.to_string(),
                document_id: document_id.to_string(),
            });
        }

        let new_id = self.allocate_split_id();
        let mut bar = TabBar::new(new_id.clone());
        bar.document_ids.push(document_id.to_string());
        bar.active_document_id = Some(document_id.to_string());
        self.bars.push(bar);
        self.active_tab_bar_id = new_id.clone();
        Ok(new_id)
    }

    pub fn reorder(
        &mut self,
        tab_bar_id: &str,
        from_index: usize,
        to_index: usize,
    ) -> Result<(), DocumentError> {
        let bar = self.bar_mut(tab_bar_id)?;
        let len = bar.document_ids.len();
        for index in [from_index, to_index] {
            if index >= len {
                return Err(DocumentError::IndexOutOfRange {
                    tab_bar_id: tab_bar_id.to_string(),
                    index,
                    len,
                });
            }
        }
        let moved = bar.document_ids.remove(from_index);
        bar.document_ids.insert(to_index, moved);
        Ok(())
    }

    /// Rewrites `old_id` to `new_id` in every bar. A bar that already lists
    /// `new_id` keeps that entry and drops the old one.
    pub fn rename_document_id(&mut self, old_id: &str, new_id: &str) {
        if old_id == new_id {
            return;
        }
        for bar in &mut self.bars {
            let Some(index) = bar.position(old_id) else {
                continue;
            };
            if bar.contains(new_id) {
                bar.document_ids.remove(index);
            } else {
                bar.document_ids[index] = new_id.to_string();
            }
            if bar.active_document_id.as_deref() == Some(old_id) {
                bar.active_document_id = Some(new_id.to_string());
            }
        }
    }

    /// Whether any bar still lists `document_id`.
    pub fn references(&self, document_id: &str) -> bool {
        self.bars.iter().any(|bar| bar.contains(document_id))
    }

    /// Ids of every bar that lists `document_id`.
    pub fn bars_containing(&self, document_id: &str) -> Vec<String> {
        self.bars
            .iter()
            .filter(|bar| bar.contains(document_id))
            .map(|bar| bar.id.clone())
            .collect()
    }

    pub fn invariants_hold(&self) -> bool {
        self.bars.iter().all(TabBar::invariant_holds) && self.get(&self.active_tab_bar_id).is_some()
    }

    fn allocate_split_id(&mut self) -> String {
        loop {
            let candidate = format!("split-{}", self.next_split_id);
            self.next_split_id += 1;
            if self.get(&candidate).is_none() {
                return candidate;
            }
        }
    }

    fn bar_mut(&mut self, tab_bar_id: &str) -> Result<&mut TabBar, DocumentError> {
        self.bars
            .iter_mut()
            .find(|bar| bar.id == tab_bar_id)
            .ok_or_else(|| DocumentError::UnknownTabBar(tab_bar_id.to_string()))
    }
}
