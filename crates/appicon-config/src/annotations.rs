//! Turns struct doc comments into TOML comments for generated config files.

use documented::{Documented, DocumentedFields};
use toml_edit::{DocumentMut, Item};
use tracing::warn;

use crate::error::{ConfigError, Result};

/// Renders documentation text as a block of `#` comment lines.
pub fn docs_to_comment(docs: &str) -> String {
    docs.lines()
        .map(|line| {
            if line.trim().is_empty() {
                "#\n".to_string()
            } else {
                format!("# {}\n", line.trim_end())
            }
        })
        .collect()
}

/// Annotates every top-level key of `doc` with the field docs of `T`.
///
/// Keys with no matching field are left alone and reported at warn level.
pub fn annotate_document<T>(doc: &mut DocumentMut) -> Result<()>
where
    T: Documented + DocumentedFields,
{
    for (mut key, item) in doc.as_table_mut().iter_mut() {
        let name = key.get().to_string();
        let Ok(docs) = T::get_field_docs(&name) else {
            warn!(key = %name, "no documentation for config key");
            continue;
        };

        let comment = docs_to_comment(docs);
        match item {
            Item::None => return Err(ConfigError::UnexpectedTomlItem(name)),
            Item::Value(_) => key.leaf_decor_mut().set_prefix(format!("\n{comment}")),
            Item::Table(table) => table.decor_mut().set_prefix(format!("\n{comment}")),
            Item::ArrayOfTables(array) => {
                if let Some(first) = array.iter_mut().next() {
                    first.decor_mut().set_prefix(format!("\n{comment}"));
                }
            }
        }
    }

    Ok(())
}

/// Renders `doc` with the container docs of `T` as a leading comment block.
pub fn render_annotated<T>(doc: &DocumentMut) -> String
where
    T: Documented,
{
    format!("{}{doc}", docs_to_comment(T::DOCS))
}
