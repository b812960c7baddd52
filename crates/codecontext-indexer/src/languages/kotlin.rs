use super::{FileExtraction, SupertypeEdge};
use crate::extract::{
    build_code_object, extract_ast_metadata, find_child, find_children, leading_doc_comment,
    node_text, signature_text, AstSpec,
};
use crate::parser::parse_source;
use codecontext_core::error::ParseError;
use codecontext_core::languages::Language;
use codecontext_core::types::{ObjectType, RelationKind};
use tree_sitter::Node;

const SPEC: AstSpec = AstSpec {
    call_kinds: &["call_expression"],
    call_name: kotlin_call_name,
    reference_kinds: &["navigation_expression"],
    branch_kinds: &[
        "if_expression",
        "while_statement",
        "do_while_statement",
        "for_statement",
        "when_entry",
        "elvis_expression",
        "catch_block",
    ],
    nesting_kinds: &[
        "if_expression",
        "while_statement",
        "for_statement",
        "when_expression",
    ],
};

const DOC_COMMENT_KINDS: &[&str] = &["multiline_comment", "block_comment", "line_comment"];

/// Callee name: text up to the argument list, last path segment.
fn kotlin_call_name(node: Node, source: &str) -> Option<String> {
    let text = node_text(node, source);
    let prefix = text.split('(').next()?.trim();
    let last = prefix
        .rsplit(['.', '?'])
        .next()
        .unwrap_or(prefix)
        .trim()
        .trim_end_matches('!');
    if last.is_empty() || !last.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_') {
        return None;
    }
    Some(last.to_string())
}

pub fn extract(
    file_path: &str,
    relative_path: &str,
    source: &str,
) -> Result<FileExtraction, ParseError> {
    let tree = parse_source(source, Language::Kotlin, relative_path)?;
    let root = tree.root_node();
    let mut extraction = FileExtraction::default();

    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "import_header" | "import" | "import_list" => {
                extraction.imports.push(node_text(child, source).trim().to_string());
            }
            "class_declaration" | "object_declaration" | "interface_declaration" => {
                extract_type(child, source, file_path, relative_path, &mut extraction);
            }
            // Kotlin has real top-level functions.
            "function_declaration" => {
                extract_function(child, source, file_path, relative_path, None, &mut extraction);
            }
            _ => {}
        }
    }

    Ok(extraction)
}

fn extract_type(
    node: Node,
    source: &str,
    file_path: &str,
    relative_path: &str,
    extraction: &mut FileExtraction,
) {
    let Some(name) = declared_name(node, source) else {
        return;
    };
    let body = find_child(node, &["class_body", "enum_class_body"]);
    let is_enum = body.is_some_and(|b| b.kind() == "enum_class_body")
        || has_keyword_child(node, "enum");
    let is_interface = node.kind() == "interface_declaration" || has_keyword_child(node, "interface");

    let object_type = if is_enum {
        ObjectType::Enum
    } else if is_interface {
        ObjectType::Interface
    } else {
        ObjectType::Class
    };

    let signature = signature_text(node, body, source);
    let docstring = leading_doc_comment(node, source, DOC_COMMENT_KINDS);
    let mut metadata = extract_ast_metadata(node, source, &SPEC);

    if is_enum {
        if let Some(body) = body {
            for entry in find_children(body, &["enum_entry"]) {
                if let Some(entry_name) = find_child(entry, &["simple_identifier", "identifier"]) {
                    metadata.members.push(node_text(entry_name, source).to_string());
                }
            }
        }
    }

    let type_object = build_code_object(
        node,
        source,
        file_path,
        relative_path,
        Language::Kotlin,
        object_type,
        name.clone(),
        Some(name.clone()),
        signature,
        docstring,
        None,
        metadata,
    );
    let type_id = type_object.id.clone();

    // Supertypes after the colon. The grammar cannot tell interface from
    // class here, so everything becomes INHERITS.
    for specifier in find_children(node, &["delegation_specifier", "delegation_specifiers"]) {
        let text = node_text(specifier, source);
        for target in text.split(',') {
            let target = target.split('(').next().unwrap_or(target).trim();
            let target = target.split('<').next().unwrap_or(target).trim();
            if !target.is_empty() {
                extraction.supertypes.push(SupertypeEdge {
                    source_id: type_id.clone(),
                    target_name: target.rsplit('.').next().unwrap_or(target).to_string(),
                    kind: RelationKind::Inherits,
                });
            }
        }
    }

    extraction.objects.push(type_object);

    if let Some(body) = body {
        for function in find_children(body, &["function_declaration"]) {
            extract_function(
                function,
                source,
                file_path,
                relative_path,
                Some((&name, &type_id)),
                extraction,
            );
        }
    }
}

fn extract_function(
    node: Node,
    source: &str,
    file_path: &str,
    relative_path: &str,
    parent: Option<(&str, &str)>,
    extraction: &mut FileExtraction,
) {
    let Some(name) = declared_name(node, source) else {
        return;
    };
    let body = find_child(node, &["function_body", "block"]);
    let signature = signature_text(node, body, source);
    let docstring = leading_doc_comment(node, source, DOC_COMMENT_KINDS);
    let metadata = extract_ast_metadata(node, source, &SPEC);

    let (object_type, qualified_name, parent_id) = match parent {
        Some((type_name, type_id)) => (
            ObjectType::Method,
            Some(format!("{type_name}.{name}")),
            Some(type_id.to_string()),
        ),
        None => (ObjectType::Function, Some(name.clone()), None),
    };

    extraction.objects.push(build_code_object(
        node,
        source,
        file_path,
        relative_path,
        Language::Kotlin,
        object_type,
        name,
        qualified_name,
        signature,
        docstring,
        parent_id,
        metadata,
    ));
}

/// Declarations name themselves with a type or simple identifier child
/// rather than a named field.
fn declared_name(node: Node, source: &str) -> Option<String> {
    if let Some(name) = node.child_by_field_name("name") {
        return Some(node_text(name, source).to_string());
    }
    find_child(node, &["type_identifier", "simple_identifier", "identifier"])
        .map(|n| node_text(n, source).to_string())
}

/// Scan raw (anonymous) children for a keyword token anywhere in the
/// declaration header, including inside a modifier list.
fn has_keyword_child(node: Node, keyword: &str) -> bool {
    for idx in 0..node.child_count() {
        let Some(child) = node.child(idx) else {
            continue;
        };
        if child.kind() == keyword {
            return true;
        }
        if child.kind().contains("modifier") {
            for inner_idx in 0..child.child_count() {
                if let Some(inner) = child.child(inner_idx) {
                    if inner.kind() == keyword {
                        return true;
                    }
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_class_with_methods() {
        let source = r#"
import java.time.Instant

class OrderService(private val store: Store) {
    fun processOrder(order: Order): Receipt {
        if (order.isValid()) {
            return store.save(order)
        }
        return Receipt.empty()
    }
}
"#;
        let extraction = extract("/repo/OrderService.kt", "OrderService.kt", source).unwrap();
        let names: Vec<&str> = extraction.objects.iter().map(|o| o.name.as_str()).collect();
        assert!(names.contains(&"OrderService"), "got {names:?}");
        assert!(names.contains(&"processOrder"), "got {names:?}");

        let method = extraction
            .objects
            .iter()
            .find(|o| o.name == "processOrder")
            .unwrap();
        assert_eq!(method.object_type, ObjectType::Method);
        assert_eq!(
            method.qualified_name.as_deref(),
            Some("OrderService.processOrder")
        );
        assert!(method.parent_id.is_some());
    }

    #[test]
    fn top_level_functions_are_emitted() {
        let source = "fun calculateTax(amount: Double): Double = amount * 0.2\n";
        let extraction = extract("/repo/tax.kt", "tax.kt", source).unwrap();
        assert_eq!(extraction.objects.len(), 1);
        assert_eq!(extraction.objects[0].name, "calculateTax");
        assert_eq!(extraction.objects[0].object_type, ObjectType::Function);
    }

    #[test]
    fn enum_classes_collect_members() {
        let source = r#"
enum class Status {
    PENDING,
    COMPLETED
}
"#;
        let extraction = extract("/repo/Status.kt", "Status.kt", source).unwrap();
        let status = extraction
            .objects
            .iter()
            .find(|o| o.name == "Status")
            .expect("Status object");
        assert_eq!(status.object_type, ObjectType::Enum);
        assert_eq!(status.ast_metadata.members, ["PENDING", "COMPLETED"]);
    }

    #[test]
    fn content_matches_byte_range() {
        let source = "class Wallet {\n    fun balance(): Int = 0\n}\n";
        let extraction = extract("/repo/Wallet.kt", "Wallet.kt", source).unwrap();
        for object in &extraction.objects {
            assert_eq!(
                object.content,
                &source[object.start_byte..object.end_byte]
            );
        }
    }
}
