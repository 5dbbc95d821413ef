//! Text rendering for the `print` instruction

use core_types::{ObjectId, Value};
use memory_manager::{Heap, HeapObject};
use type_registry::TypeRegistry;

/// Nesting depth past which containers print as `...`
const MAX_DEPTH: usize = 32;

/// Render a value the way `print` writes it.
///
/// Booleans print `true`/`false`, integers in decimal, floats with six
/// decimals, strings raw, tuples as `(a, b)`, arrays as `[a, b]`, instances
/// as `<Name>` and generic instances as `Name<P, Q>`.
pub fn format_value(heap: &Heap, registry: &TypeRegistry, value: &Value) -> String {
    let mut out = String::new();
    write_value(heap, registry, value, 0, &mut out);
    out
}

fn write_value(heap: &Heap, registry: &TypeRegistry, value: &Value, depth: usize, out: &mut String) {
    match value {
        Value::Reference(None) => out.push_str("null"),
        Value::Reference(Some(id)) => write_object(heap, registry, *id, depth, out),
        Value::ReturnAddress(address) => out.push_str(&format!("<return {address}>")),
        Value::Uninitialized => out.push_str("<uninitialized>"),
    }
}

fn write_object(heap: &Heap, registry: &TypeRegistry, id: ObjectId, depth: usize, out: &mut String) {
    if depth >= MAX_DEPTH {
        out.push_str("...");
        return;
    }
    let Some(object) = heap.get(id) else {
        out.push_str("<dangling>");
        return;
    };
    match object {
        HeapObject::Integer(v) => out.push_str(&v.to_string()),
        HeapObject::Float(v) => out.push_str(&format!("{v:.6}")),
        HeapObject::Boolean(v) => out.push_str(if *v { "true" } else { "false" }),
        HeapObject::String { bytes, .. } => out.push_str(&String::from_utf8_lossy(bytes)),
        HeapObject::Array(elements) => {
            write_sequence(heap, registry, elements, ('[', ']'), depth, out);
        }
        HeapObject::Tuple(elements) => {
            write_sequence(heap, registry, elements, ('(', ')'), depth, out);
        }
        HeapObject::Instance { type_id, .. } => {
            out.push('<');
            out.push_str(&type_name(registry, *type_id));
            out.push('>');
        }
        HeapObject::Type(type_id) => out.push_str(&type_name(registry, *type_id)),
        HeapObject::GenericInstance {
            base_type,
            type_params,
        } => {
            write_object(heap, registry, *base_type, depth + 1, out);
            out.push('<');
            for (i, param) in type_params.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_object(heap, registry, *param, depth + 1, out);
            }
            out.push('>');
        }
    }
}

fn write_sequence(
    heap: &Heap,
    registry: &TypeRegistry,
    elements: &[Value],
    (open, close): (char, char),
    depth: usize,
    out: &mut String,
) {
    out.push(open);
    for (i, element) in elements.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_value(heap, registry, element, depth + 1, out);
    }
    out.push(close);
}

fn type_name(registry: &TypeRegistry, type_id: u32) -> String {
    registry
        .get_type(type_id)
        .map_or_else(|| format!("type#{type_id}"), |info| info.name.clone())
}
