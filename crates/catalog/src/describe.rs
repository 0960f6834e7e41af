//! Human-readable catalog listings.

use common::{
    SchemaResult,
    pretty::{self, ObjectRow, TableStyleKind},
};

use crate::{
    iter::ObjectFilter,
    registry::Object,
    resolve,
    schema::Schema,
};

/// Render the objects selected by `filter` as a table, ordered by class and name.
pub fn render_objects<S: Schema>(
    schema: &S,
    filter: ObjectFilter,
    style: TableStyleKind,
) -> SchemaResult<String> {
    let objects = schema.get_objects(filter).to_vec();
    let mut rows = objects
        .into_iter()
        .map(|obj| object_row(schema, obj))
        .collect::<SchemaResult<Vec<_>>>()?;
    rows.sort_by(|a, b| (&a.class, &a.name).cmp(&(&b.class, &b.name)));
    Ok(pretty::render_object_rows(&rows, style))
}

/// Render the stored tuple of a single object, one line per field.
pub fn render_fields<S: Schema>(schema: &S, obj: Object) -> SchemaResult<String> {
    let data = schema.get_data_raw(obj)?;
    let rows = obj
        .descriptor()
        .fields
        .iter()
        .map(|field| {
            let value = data.get(field.index).map(pretty::format_value);
            vec![field.name.to_string(), value.unwrap_or_else(|| "NULL".into())]
        })
        .collect();
    Ok(pretty::render_string_table(&["Field", "Value"], rows, TableStyleKind::Plain))
}

fn object_row<S: Schema>(schema: &S, obj: Object) -> SchemaResult<ObjectRow> {
    let name = schema.name_of(obj)?;
    Ok(ObjectRow {
        class: obj.class.display_name().to_string(),
        name: resolve::display_name(obj.class, name),
        id: pretty::format_object_id(&obj.id),
    })
}
