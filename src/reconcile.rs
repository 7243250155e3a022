// ==========================================
// Motor de reconciliación de columnas
// ==========================================
// Transformación pura: (header fuente, filas, header destino) →
// (header destino, filas normalizadas). Sin I/O ni estado oculto.
// Orden de reglas:
//   1. alias de headers (Subcaregoría → Subcategoría)
//   2. descarte de la columna `ID` exacta
//   3. relleno de columnas faltantes ("" o "1" para Rastrear Inventario)
//   4. Rastrear Inventario vacío → "1"
//   5. orden de salida según el header destino
// ==========================================

use std::collections::HashMap;

use crate::models::{
    is_id_column, is_track_inventory_column, normalize_header_name, Header, Table,
    TRACK_INVENTORY_DEFAULT, TRACK_INVENTORY_HEADER,
};

/// Alias fijos, indexados por header en minúsculas
const HEADER_ALIASES: [(&str, &str); 2] = [
    ("subcaregoría", "Subcategoría"),
    ("subcaregoria", "Subcategoría"),
];

/// Resuelve un header a través de los alias
pub fn apply_alias(name: &str) -> String {
    let normalized = normalize_header_name(name);
    let key = normalized.to_lowercase();
    HEADER_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(normalized)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    IdColumn,
    NotInTarget,
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnAction {
    Keep { column: String },
    Rename { from: String, to: String, alias: bool },
    Fill { column: String, default: String },
    Drop { column: String, reason: DropReason },
}

/// Decisiones por columna para un par (header fuente, header destino)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationPlan {
    source_header: Header,
    target_header: Header,
    actions: Vec<ColumnAction>,
    // Por columna destino: índice en la fila fuente, si existe
    source_index: Vec<Option<usize>>,
}

impl ReconciliationPlan {
    pub fn build(source_header: &Header, target_header: &Header) -> Self {
        let target_lookup: HashMap<String, usize> = target_header
            .iter()
            .enumerate()
            .filter(|(_, column)| !column.is_empty())
            .map(|(index, column)| (column.to_lowercase(), index))
            .collect();

        let mut actions = Vec::with_capacity(source_header.len() + target_header.len());
        let mut source_index: Vec<Option<usize>> = vec![None; target_header.len()];

        for (index, raw) in source_header.iter().enumerate() {
            let aliased = apply_alias(raw);
            let alias_applied = aliased != normalize_header_name(raw);

            if is_id_column(&aliased) {
                actions.push(ColumnAction::Drop {
                    column: raw.to_string(),
                    reason: DropReason::IdColumn,
                });
                continue;
            }

            let Some(&target_pos) = target_lookup.get(&aliased.to_lowercase()) else {
                actions.push(ColumnAction::Drop {
                    column: raw.to_string(),
                    reason: DropReason::NotInTarget,
                });
                continue;
            };

            if source_index[target_pos].is_some() {
                actions.push(ColumnAction::Drop {
                    column: raw.to_string(),
                    reason: DropReason::Duplicate,
                });
                continue;
            }

            source_index[target_pos] = Some(index);
            let target_name = &target_header.columns()[target_pos];
            if target_name == raw {
                actions.push(ColumnAction::Keep {
                    column: raw.to_string(),
                });
            } else {
                actions.push(ColumnAction::Rename {
                    from: raw.to_string(),
                    to: target_name.clone(),
                    alias: alias_applied,
                });
            }
        }

        for (target_pos, column) in target_header.iter().enumerate() {
            if source_index[target_pos].is_none() {
                actions.push(ColumnAction::Fill {
                    column: column.to_string(),
                    default: default_fill(column).to_string(),
                });
            }
        }

        Self {
            source_header: source_header.clone(),
            target_header: target_header.clone(),
            actions,
            source_index,
        }
    }

    pub fn source_header(&self) -> &Header {
        &self.source_header
    }

    pub fn target_header(&self) -> &Header {
        &self.target_header
    }

    pub fn actions(&self) -> &[ColumnAction] {
        &self.actions
    }

    pub fn missing_columns(&self) -> Vec<&str> {
        self.actions
            .iter()
            .filter_map(|action| match action {
                ColumnAction::Fill { column, .. } => Some(column.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn dropped_columns(&self) -> Vec<&str> {
        self.actions
            .iter()
            .filter_map(|action| match action {
                ColumnAction::Drop { column, .. } => Some(column.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn renamed_columns(&self) -> Vec<(&str, &str)> {
        self.actions
            .iter()
            .filter_map(|action| match action {
                ColumnAction::Rename { from, to, .. } => Some((from.as_str(), to.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Reglas de header que aplica el plan, en orden
    pub fn fired_rules(&self) -> Vec<&'static str> {
        let mut rules = Vec::new();

        if self.any_action(|a| matches!(a, ColumnAction::Rename { alias: true, .. })) {
            rules.push("alias");
        }
        if self.any_action(|a| matches!(a, ColumnAction::Rename { alias: false, .. })) {
            rules.push("rename");
        }
        if self.any_action(|a| matches!(a, ColumnAction::Drop { reason: DropReason::IdColumn, .. })) {
            rules.push("drop-id");
        }
        if self.any_action(|a| {
            matches!(
                a,
                ColumnAction::Drop {
                    reason: DropReason::NotInTarget | DropReason::Duplicate,
                    ..
                }
            )
        }) {
            rules.push("drop-extra");
        }
        if self.any_action(|a| matches!(a, ColumnAction::Fill { .. })) {
            rules.push("fill-missing");
        }
        if self.reorders() {
            rules.push("reorder");
        }
        rules
    }

    fn any_action(&self, pred: impl Fn(&ColumnAction) -> bool) -> bool {
        self.actions.iter().any(pred)
    }

    fn reorders(&self) -> bool {
        let kept: Vec<usize> = self.source_index.iter().flatten().copied().collect();
        kept.windows(2).any(|pair| pair[0] > pair[1])
    }

    fn apply_row(&self, row: &[String]) -> (Vec<String>, bool) {
        let mut defaulted = false;
        let cells = self
            .target_header
            .iter()
            .zip(&self.source_index)
            .map(|(column, source)| match source {
                Some(index) => {
                    let value = &row[*index];
                    if is_track_inventory_column(column) && value.trim().is_empty() {
                        defaulted = true;
                        TRACK_INVENTORY_DEFAULT.to_string()
                    } else {
                        value.clone()
                    }
                }
                None => default_fill(column).to_string(),
            })
            .collect();
        (cells, defaulted)
    }
}

/// Resultado de reconciliar una tabla
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub table: Table,
    pub plan: ReconciliationPlan,
    /// Filas con `Rastrear Inventario` vacío que pasaron a "1"
    pub defaulted_rows: usize,
}

impl Reconciled {
    /// Toda regla que cambió algo, de header o de fila
    pub fn fired_rules(&self) -> Vec<&'static str> {
        let mut rules = self.plan.fired_rules();
        if self.defaulted_rows > 0 {
            rules.push("track-inventory-default");
        }
        rules
    }
}

/// Reconcilia `source` al layout de `target`
pub fn reconcile(source: &Table, target: &Header) -> Reconciled {
    let plan = ReconciliationPlan::build(source.header(), target);
    let mut defaulted_rows = 0;
    let rows: Vec<Vec<String>> = source
        .rows()
        .iter()
        .map(|row| {
            let (cells, defaulted) = plan.apply_row(row);
            if defaulted {
                defaulted_rows += 1;
            }
            cells
        })
        .collect();

    // Las filas salen del header destino: la forma siempre coincide
    let table = match Table::new(target.clone(), rows) {
        Ok(table) => table,
        Err(err) => unreachable!("reconciled rows follow the target header: {err}"),
    };

    Reconciled {
        table,
        plan,
        defaulted_rows,
    }
}

/// Destino que el normalizador impone a un archivo: su propio header tras
/// alias y descarte de `ID`, más `Rastrear Inventario` si falta.
pub fn normalization_target(source: &Header) -> Header {
    let mut columns: Vec<String> = Vec::with_capacity(source.len() + 1);
    for raw in source.iter() {
        let aliased = apply_alias(raw);
        if aliased.is_empty() || is_id_column(&aliased) {
            continue;
        }
        if columns.iter().any(|c| c.to_lowercase() == aliased.to_lowercase()) {
            continue;
        }
        columns.push(aliased);
    }
    if !columns.iter().any(|c| is_track_inventory_column(c)) {
        columns.push(TRACK_INVENTORY_HEADER.to_string());
    }
    match Header::new(columns) {
        Ok(header) => header,
        Err(err) => unreachable!("columns were de-duplicated above: {err}"),
    }
}

fn default_fill(column: &str) -> &'static str {
    if is_track_inventory_column(column) {
        TRACK_INVENTORY_DEFAULT
    } else {
        ""
    }
}
