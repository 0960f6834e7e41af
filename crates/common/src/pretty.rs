use tabled::{Table, Tabled, builder::Builder, settings};
use types::{ObjectId, Value};

/// Predefined output styles that map to `tabled` styles.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TableStyleKind {
    #[default]
    Modern,
    Ascii,
    Plain,
}

impl TableStyleKind {
    fn apply(self, table: &mut Table) {
        match self {
            Self::Modern => table.with(settings::Style::modern()),
            Self::Ascii => table.with(settings::Style::ascii()),
            Self::Plain => table.with(settings::Style::empty()),
        };
    }
}

/// One line of a catalog listing.
#[derive(Clone, Debug, PartialEq, Eq, Tabled)]
pub struct ObjectRow {
    #[tabled(rename = "Class")]
    pub class: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Id")]
    pub id: String,
}

/// Render catalog listing rows with the provided style.
pub fn render_object_rows(rows: &[ObjectRow], style: TableStyleKind) -> String {
    render_structured_rows(rows, style)
}

/// Render arbitrary string rows with the provided style.
pub fn render_string_table(
    headers: &[&str],
    rows: Vec<Vec<String>>,
    style: TableStyleKind,
) -> String {
    if headers.is_empty() && rows.is_empty() {
        return "<empty>".into();
    }

    let mut builder = Builder::default();

    if !headers.is_empty() {
        builder.push_record(headers.iter().copied());
    }

    for row in rows {
        builder.push_record(row);
    }

    let mut table = builder.build();
    style.apply(&mut table);
    table.to_string()
}

/// Render any `Tabled` rows with the provided style.
pub fn render_structured_rows<T>(rows: &[T], style: TableStyleKind) -> String
where
    T: Tabled + Clone,
{
    if rows.is_empty() {
        return "<empty>".into();
    }

    let mut table = Table::new(rows.to_vec());
    style.apply(&mut table);
    table.to_string()
}

/// Format a single stored value for display.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".into(),
        Value::Bool(b) => b.to_string(),
        Value::Int(v) => v.to_string(),
        Value::Text(text) => format!("'{}'", text),
        Value::Name(name) => name.to_string(),
        Value::ObjectRef(id) => format_object_id(id),
        Value::ObjectList(ids) => format!(
            "[{}]",
            ids.iter().map(format_object_id).collect::<Vec<_>>().join(", ")
        ),
        Value::ObjectDict(entries) => format!(
            "{{{}}}",
            entries
                .iter()
                .map(|(key, id)| format!("{key}: {}", format_object_id(id)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Value::Expression { text, .. } => format!("({text})"),
    }
}

/// Shortened object id, the first uuid group.
pub fn format_object_id(id: &ObjectId) -> String {
    let text = id.to_string();
    match text.split_once('-') {
        Some((head, _)) => format!("<{head}>"),
        None => format!("<{text}>"),
    }
}
