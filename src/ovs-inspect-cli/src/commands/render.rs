//! Rendering target values the way a debugger prints them
//!
//! Scalars print as numbers (pointers in hex, strings quoted), records as
//! `{field = value, ...}` in offset order. A field that cannot be read is
//! shown as `<unreadable>` instead of failing the whole record.

use ovs_inspect::{FieldType, Oracle, TypeDescriptor, TypedAddress, Value};

/// Nested records deeper than this print as `{...}`
const MAX_DEPTH: usize = 4;

/// Arrays print at most this many elements
const MAX_ELEMENTS: usize = 16;

/// Render every field of the `type_name` record at `address`
pub fn record(oracle: &dyn Oracle, address: u64, type_name: &str) -> ovs_inspect::Result<String> {
    let ty = oracle.resolve_type(type_name)?;
    Ok(fields(oracle, address, &ty, 0))
}

/// Render the field at `path` of `record`
///
/// Fails only when the path is not in the layout.
pub fn field(
    oracle: &dyn Oracle,
    record: &TypedAddress,
    path: &str,
) -> ovs_inspect::Result<String> {
    let location = oracle.field(record.type_name(), path)?;
    Ok(value(
        oracle,
        record.address().wrapping_add(location.offset),
        &location.ty,
        0,
    ))
}

fn fields(oracle: &dyn Oracle, address: u64, ty: &TypeDescriptor, depth: usize) -> String {
    let mut members: Vec<_> = ty.fields.iter().collect();
    members.sort_by_key(|(name, field)| (field.offset, name.as_str()));

    let rendered: Vec<String> = members
        .into_iter()
        .map(|(name, field)| {
            format!(
                "{} = {}",
                name,
                value(oracle, address.wrapping_add(field.offset), &field.ty, depth)
            )
        })
        .collect();
    format!("{{{}}}", rendered.join(", "))
}

fn value(oracle: &dyn Oracle, address: u64, ty: &FieldType, depth: usize) -> String {
    match ty {
        FieldType::Aggregate(name) => {
            if depth >= MAX_DEPTH {
                return "{...}".to_string();
            }
            match oracle.resolve_type(name) {
                Ok(nested) => fields(oracle, address, &nested, depth + 1),
                Err(_) => format!("<{}>", name),
            }
        }
        FieldType::Array { element, count } => {
            let Some(count) = *count else {
                return "[...]".to_string();
            };
            let Ok(stride) = oracle.size_of(element) else {
                return format!("<{}>", element);
            };
            let shown = count.min(MAX_ELEMENTS);
            let mut items: Vec<String> = (0..shown)
                .map(|i| {
                    let at = address.wrapping_add(stride.wrapping_mul(i as u64));
                    value(oracle, at, element, depth + 1)
                })
                .collect();
            if count > shown {
                items.push("...".to_string());
            }
            format!("[{}]", items.join(", "))
        }
        FieldType::Bool => match oracle.read_scalar(address, ty) {
            Ok(v) if v.as_u64() == Some(0) => "false".to_string(),
            Ok(_) => "true".to_string(),
            Err(_) => "<unreadable>".to_string(),
        },
        _ => match oracle.read_scalar(address, ty) {
            Ok(v) => v.to_string(),
            Err(_) if matches!(ty, FieldType::CString) => unreadable_string(oracle, address),
            Err(_) => "<unreadable>".to_string(),
        },
    }
}

/// A `char *` whose target is unreadable still shows the pointer
fn unreadable_string(oracle: &dyn Oracle, address: u64) -> String {
    match oracle.read_ptr(address) {
        Ok(ptr) => format!("{} <unreadable>", Value::Address(ptr)),
        Err(_) => "<unreadable>".to_string(),
    }
}
