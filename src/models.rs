use std::collections::HashSet;

use crate::error::SchemaError;

// ==========================================
// Esquema canónico de columnas de inventario
// ==========================================

pub const ID_HEADER: &str = "ID";
pub const TRACK_INVENTORY_HEADER: &str = "Rastrear Inventario";
pub const TRACK_INVENTORY_DEFAULT: &str = "1";

/// Layout del archivo de importación de productos. `ID` es la primera columna
pub const IMPORT_HEADERS: [&str; 38] = [
    ID_HEADER,
    "Base EAN13",
    "Digito verificador",
    "Código de Barras",
    "Producto",
    "Marca",
    "Modelo",
    "Cantidad a la mano",
    "Atributo",
    "Valores Atributo",
    "Venta con IVA",
    "Venta sin IVA",
    "SKU Proveedor",
    "Largo Envio",
    "Ancho Envio",
    "Alto Envio",
    "Peso completo",
    "Dimensiones Producto",
    "Material",
    "Proveedor",
    "Precio de Costo",
    "# Variantes de producto",
    "Observaciones",
    "Descripción para el sitio web",
    "Descripción SEO",
    "Referencia interna",
    "Nombre Base",
    "Nombre Comercial",
    "Categoría de Punto de venta",
    "Subcategoría",
    "Volumen",
    "Imagen",
    "Categoría del Producto",
    "Está Publicado",
    TRACK_INVENTORY_HEADER,
    "Etiquetas",
    "Sitio web",
    "Disponible en PdV",
];

/// Header de la plantilla mínima de importación
pub const TEMPLATE_HEADERS: [&str; 3] = ["sku", "nombre", "cantidad"];

/// Campos obligatorios de cada fila importada
pub const REQUIRED_IMPORT_FIELDS: [&str; 3] = ["sku", "nombre", "cantidad"];

/// Esquema de referencia por categoría: el layout de importación sin `ID`
pub fn info_products_header() -> Header {
    Header::from_trusted(
        IMPORT_HEADERS
            .iter()
            .filter(|column| !is_id_column(column))
            .map(|column| column.to_string())
            .collect(),
    )
}

pub fn template_header() -> Header {
    Header::from_trusted(TEMPLATE_HEADERS.iter().map(|c| c.to_string()).collect())
}

/// Quita BOM UTF-8 y espacios alrededor de un header
pub fn normalize_header_name(raw: &str) -> String {
    raw.replace('\u{feff}', "").trim().to_string()
}

/// `true` solo para una columna llamada exactamente `id` (sin distinguir
/// mayúsculas, sin espacios). `ID Externo` o `Base EAN13` nunca coinciden.
pub fn is_id_column(name: &str) -> bool {
    normalize_header_name(name).eq_ignore_ascii_case(ID_HEADER)
}

pub fn is_track_inventory_column(name: &str) -> bool {
    normalize_header_name(name).eq_ignore_ascii_case(TRACK_INVENTORY_HEADER)
}

/// Secuencia ordenada de columnas. Los nombres no vacíos son únicos; los
/// vacíos (delimitadores al final) se toleran y nunca se buscan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Header {
    columns: Vec<String>,
}

impl Header {
    pub fn new<I, S>(columns: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut seen = HashSet::new();
        for column in &columns {
            if column.is_empty() {
                continue;
            }
            if !seen.insert(column.as_str()) {
                return Err(SchemaError::DuplicateColumn(column.clone()));
            }
        }
        Ok(Self { columns })
    }

    pub(crate) fn from_trusted(columns: Vec<String>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.position(column).is_some()
    }
}

/// Una fila como mapa ordenado columna → valor. Insertar una columna
/// existente reemplaza su valor en el lugar.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut record = Record::new();
        for (column, value) in iter {
            record.insert(column, value);
        }
        record
    }
}

/// Header más filas; cada fila tiene exactamente `header.len()` celdas
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    header: Header,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(header: Header, rows: Vec<Vec<String>>) -> Result<Self, SchemaError> {
        for (index, row) in rows.iter().enumerate() {
            if row.len() != header.len() {
                return Err(SchemaError::RaggedRow {
                    row: index + 1,
                    expected: header.len(),
                    found: row.len(),
                });
            }
        }
        Ok(Self { header, rows })
    }

    /// Para filas construidas a partir del propio header.
    pub(crate) fn from_trusted(header: Header, rows: Vec<Vec<String>>) -> Self {
        debug_assert!(rows.iter().all(|row| row.len() == header.len()));
        Self { header, rows }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Valor de `column` en `row` (base 0)
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.header.position(column)?;
        self.rows.get(row).map(|cells| cells[index].as_str())
    }

    pub fn record(&self, row: usize) -> Option<Record> {
        let cells = self.rows.get(row)?;
        Some(
            self.header
                .iter()
                .zip(cells.iter())
                .map(|(column, value)| (column.to_string(), value.clone()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_detection_is_exact_and_case_insensitive() {
        assert!(is_id_column("ID"));
        assert!(is_id_column(" id "));
        assert!(is_id_column("\u{feff}Id"));
        assert!(!is_id_column("ID Externo"));
        assert!(!is_id_column("Base EAN13"));
        assert!(!is_id_column("Identificador"));
    }

    #[test]
    fn info_products_header_has_no_id() {
        let header = info_products_header();
        assert_eq!(header.len(), IMPORT_HEADERS.len() - 1);
        assert!(!header.iter().any(is_id_column));
        assert!(header.contains(TRACK_INVENTORY_HEADER));
        assert_eq!(header.columns()[0], "Base EAN13");
    }

    #[test]
    fn header_rejects_duplicates_but_tolerates_blanks() {
        assert_eq!(
            Header::new(["sku", "sku"]),
            Err(SchemaError::DuplicateColumn("sku".to_string()))
        );
        assert!(Header::new(["sku", "", ""]).is_ok());
    }

    #[test]
    fn table_rejects_ragged_rows() {
        let header = Header::new(["a", "b"]).unwrap();
        let err = Table::new(header, vec![vec!["1".into()]]).unwrap_err();
        assert_eq!(
            err,
            SchemaError::RaggedRow {
                row: 1,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn record_insert_replaces_in_place() {
        let mut record = Record::new().with("sku", "A1").with("nombre", "Widget");
        record.insert("sku", "B2");
        assert_eq!(record.get("sku"), Some("B2"));
        assert_eq!(record.columns().collect::<Vec<_>>(), vec!["sku", "nombre"]);
    }

    #[test]
    fn table_record_view_follows_header_order() {
        let header = Header::new(["sku", "nombre"]).unwrap();
        let table = Table::new(header, vec![vec!["A1".into(), "Widget".into()]]).unwrap();
        let record = table.record(0).unwrap();
        assert_eq!(record.iter().collect::<Vec<_>>(), vec![("sku", "A1"), ("nombre", "Widget")]);
        assert_eq!(table.value(0, "nombre"), Some("Widget"));
        assert!(table.record(1).is_none());
    }
}
