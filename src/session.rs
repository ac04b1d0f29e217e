//! # Session Module
//!
//! Stato di lavoro posseduto da un'unica struct, aggiornato per eventi.
//!
//! ## Responsabilità:
//! - Possiede il set di asset, la selezione, la vista (filtro + ordinamento)
//!   e le identità visualizzate derivate
//! - Ogni azione utente è un `SessionEvent`; la sessione viene consumata e
//!   restituita (`(state, event) -> state`)
//! - Risolve i target di un batch e lo stato dei comandi batch
//!
//! ## Invarianti:
//! - La selezione sopravvive a ogni ricalcolo della vista
//! - `select all` sostituisce la selezione con le sole identità visualizzate
//! - Le dimensioni già sondate restano in cache anche dopo un `Refresh`

use crate::asset::{AssetRecord, AssetSet};
use crate::filter::{FilterCriterion, FilterSortEngine, SortCriterion};
use crate::selection::SelectionStore;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewState {
    pub filter: FilterCriterion,
    pub sort: SortCriterion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Toggle(String),
    SelectAll,
    ClearSelection,
    SetFilter(FilterCriterion),
    SetSort(SortCriterion),
    /// A fresh collector result replaces the record set
    Refresh(Vec<AssetRecord>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchScope {
    Selected,
    All,
}

/// State of the select-all control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectAllState {
    Unchecked,
    Checked,
    Indeterminate,
}

/// What the batch commands would act on right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchAvailability {
    pub enabled: bool,
    pub scope: BatchScope,
    pub count: usize,
    pub select_all: SelectAllState,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    assets: AssetSet,
    selection: SelectionStore,
    view: ViewState,
    displayed: Vec<String>,
}

impl Session {
    /// Builds a session over collector output with the default view
    pub async fn new(records: Vec<AssetRecord>, engine: &FilterSortEngine) -> Self {
        Self::with_view(records, ViewState::default(), engine).await
    }

    pub async fn with_view(
        records: Vec<AssetRecord>,
        view: ViewState,
        engine: &FilterSortEngine,
    ) -> Self {
        let mut session = Self {
            assets: AssetSet::new(records),
            selection: SelectionStore::new(),
            view,
            displayed: Vec::new(),
        };
        session.recompute(engine).await;
        session
    }

    /// Applies one user event and returns the next state
    pub async fn handle(mut self, event: SessionEvent, engine: &FilterSortEngine) -> Self {
        match event {
            SessionEvent::Toggle(identity) => self.selection.toggle(&identity),
            SessionEvent::SelectAll => self.selection.select_all(self.displayed.iter().cloned()),
            SessionEvent::ClearSelection => self.selection.clear(),
            SessionEvent::SetFilter(filter) => {
                self.view.filter = filter;
                self.recompute(engine).await;
            }
            SessionEvent::SetSort(sort) => {
                self.view.sort = sort;
                self.recompute(engine).await;
            }
            SessionEvent::Refresh(records) => {
                let previous = std::mem::replace(&mut self.assets, AssetSet::new(records));
                for record in previous.iter() {
                    if let Some(size) = record.byte_size {
                        self.assets.record_size(&record.identity, size);
                    }
                }
                self.recompute(engine).await;
            }
        }
        self
    }

    async fn recompute(&mut self, engine: &FilterSortEngine) {
        let displayed = engine
            .apply(&mut self.assets, self.view.filter, self.view.sort)
            .await;
        self.displayed = displayed.into_iter().map(|record| record.identity).collect();
        debug!(
            "Displaying {}/{} assets (filter {}, {} selected)",
            self.displayed.len(),
            self.assets.len(),
            self.view.filter,
            self.selection.len()
        );
    }

    pub fn assets(&self) -> &AssetSet {
        &self.assets
    }

    pub fn selection(&self) -> &SelectionStore {
        &self.selection
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    /// Displayed records in display order
    pub fn displayed(&self) -> Vec<&AssetRecord> {
        self.displayed
            .iter()
            .filter_map(|identity| self.assets.get(identity))
            .collect()
    }

    /// Batch targets: displayed records that are selected, or every displayed
    /// record when nothing is selected. Display order is kept.
    pub fn resolve_targets(&self) -> Vec<AssetRecord> {
        self.displayed()
            .into_iter()
            .filter(|record| self.selection.is_empty() || self.selection.contains(&record.identity))
            .cloned()
            .collect()
    }

    pub fn batch_availability(&self) -> BatchAvailability {
        let scope = if self.selection.is_empty() {
            BatchScope::All
        } else {
            BatchScope::Selected
        };
        let count = match scope {
            BatchScope::All => self.displayed.len(),
            BatchScope::Selected => self.selection.len(),
        };

        let displayed = self.displayed.len();
        let select_all = if displayed > 0 && self.selection.len() == displayed {
            SelectAllState::Checked
        } else if !self.selection.is_empty() && self.selection.len() < displayed {
            SelectAllState::Indeterminate
        } else {
            SelectAllState::Unchecked
        };

        BatchAvailability {
            enabled: !self.assets.is_empty() && displayed > 0,
            scope,
            count,
            select_all,
        }
    }
}
