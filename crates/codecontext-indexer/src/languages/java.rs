use super::{FileExtraction, SupertypeEdge};
use crate::extract::{
    build_code_object, extract_ast_metadata, find_child, leading_doc_comment, node_text,
    signature_text, AstSpec,
};
use crate::parser::parse_source;
use codecontext_core::error::ParseError;
use codecontext_core::languages::Language;
use codecontext_core::types::{ObjectType, RelationKind};
use tree_sitter::Node;

const SPEC: AstSpec = AstSpec {
    call_kinds: &["method_invocation", "object_creation_expression"],
    call_name: java_call_name,
    reference_kinds: &["field_access"],
    branch_kinds: &[
        "if_statement",
        "while_statement",
        "for_statement",
        "enhanced_for_statement",
        "switch_expression",
        "ternary_expression",
        "catch_clause",
    ],
    nesting_kinds: &[
        "if_statement",
        "while_statement",
        "for_statement",
        "enhanced_for_statement",
    ],
};

const DOC_COMMENT_KINDS: &[&str] = &["block_comment", "line_comment"];

fn java_call_name(node: Node, source: &str) -> Option<String> {
    match node.kind() {
        "method_invocation" => node
            .child_by_field_name("name")
            .map(|name| node_text(name, source).to_string()),
        "object_creation_expression" => node
            .child_by_field_name("type")
            .map(|ty| node_text(ty, source).to_string()),
        _ => None,
    }
}

pub fn extract(
    file_path: &str,
    relative_path: &str,
    source: &str,
) -> Result<FileExtraction, ParseError> {
    let tree = parse_source(source, Language::Java, relative_path)?;
    let root = tree.root_node();
    let mut extraction = FileExtraction::default();

    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "import_declaration" => {
                extraction.imports.push(node_text(child, source).to_string());
            }
            "class_declaration" => {
                extract_type(child, source, file_path, relative_path, ObjectType::Class, &mut extraction);
            }
            "interface_declaration" => {
                extract_type(
                    child,
                    source,
                    file_path,
                    relative_path,
                    ObjectType::Interface,
                    &mut extraction,
                );
            }
            "enum_declaration" => {
                extract_enum(child, source, file_path, relative_path, &mut extraction);
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
    object_type: ObjectType,
    extraction: &mut FileExtraction,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source).to_string();
    let body = node.child_by_field_name("body");
    let signature = signature_text(node, body, source);
    let docstring = leading_doc_comment(node, source, DOC_COMMENT_KINDS);
    let metadata = extract_ast_metadata(node, source, &SPEC);

    let type_object = build_code_object(
        node,
        source,
        file_path,
        relative_path,
        Language::Java,
        object_type,
        name.clone(),
        Some(name.clone()),
        signature,
        docstring,
        None,
        metadata,
    );
    let type_id = type_object.id.clone();

    // `extends Base`
    if let Some(superclass) = node.child_by_field_name("superclass") {
        if let Some(target) = type_name(superclass, source) {
            extraction.supertypes.push(SupertypeEdge {
                source_id: type_id.clone(),
                target_name: target,
                kind: RelationKind::Inherits,
            });
        }
    }
    // `implements A, B`
    if let Some(interfaces) = node.child_by_field_name("interfaces") {
        if let Some(type_list) = find_child(interfaces, &["type_list"]) {
            let mut cursor = type_list.walk();
            for ty in type_list.named_children(&mut cursor) {
                if let Some(target) = type_name(ty, source) {
                    extraction.supertypes.push(SupertypeEdge {
                        source_id: type_id.clone(),
                        target_name: target,
                        kind: RelationKind::Implements,
                    });
                }
            }
        }
    }

    extraction.objects.push(type_object);

    if let Some(body) = body {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            match member.kind() {
                "method_declaration" => extract_method(
                    member,
                    source,
                    file_path,
                    relative_path,
                    &name,
                    &type_id,
                    ObjectType::Method,
                    extraction,
                ),
                "constructor_declaration" => extract_method(
                    member,
                    source,
                    file_path,
                    relative_path,
                    &name,
                    &type_id,
                    ObjectType::Constructor,
                    extraction,
                ),
                _ => {}
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn extract_method(
    node: Node,
    source: &str,
    file_path: &str,
    relative_path: &str,
    class_name: &str,
    class_id: &str,
    object_type: ObjectType,
    extraction: &mut FileExtraction,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source).to_string();
    let signature = method_signature(&name, node, source);
    let docstring = leading_doc_comment(node, source, DOC_COMMENT_KINDS);
    let metadata = extract_ast_metadata(node, source, &SPEC);

    extraction.objects.push(build_code_object(
        node,
        source,
        file_path,
        relative_path,
        Language::Java,
        object_type,
        name.clone(),
        Some(format!("{class_name}.{name}")),
        signature,
        docstring,
        Some(class_id.to_string()),
        metadata,
    ));
}

fn extract_enum(
    node: Node,
    source: &str,
    file_path: &str,
    relative_path: &str,
    extraction: &mut FileExtraction,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source).to_string();
    let body = node.child_by_field_name("body");
    let signature = signature_text(node, body, source);
    let docstring = leading_doc_comment(node, source, DOC_COMMENT_KINDS);
    let mut metadata = extract_ast_metadata(node, source, &SPEC);

    if let Some(body) = body {
        let mut cursor = body.walk();
        for constant in body.named_children(&mut cursor) {
            if constant.kind() == "enum_constant" {
                if let Some(constant_name) = constant.child_by_field_name("name") {
                    metadata.members.push(node_text(constant_name, source).to_string());
                }
            }
        }
    }

    extraction.objects.push(build_code_object(
        node,
        source,
        file_path,
        relative_path,
        Language::Java,
        ObjectType::Enum,
        name.clone(),
        Some(name),
        signature,
        docstring,
        None,
        metadata,
    ));
}

fn method_signature(name: &str, node: Node, source: &str) -> String {
    match node.child_by_field_name("parameters") {
        Some(params) => format!("{name}{}", node_text(params, source)),
        None => format!("{name}()"),
    }
}

fn type_name(node: Node, source: &str) -> Option<String> {
    if node.kind() == "type_identifier" {
        return Some(node_text(node, source).to_string());
    }
    find_child(node, &["type_identifier", "scoped_type_identifier", "generic_type"])
        .map(|n| {
            let text = node_text(n, source);
            text.split('<').next().unwrap_or(text).trim().to_string()
        })
        .or_else(|| {
            // Fall back to the raw text minus the `extends` keyword.
            let text = node_text(node, source);
            let cleaned = text.trim_start_matches("extends").trim();
            if cleaned.is_empty() {
                None
            } else {
                Some(cleaned.split('<').next().unwrap_or(cleaned).to_string())
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_class_with_methods_and_javadoc() {
        let source = r#"
import java.util.List;

/** Coordinates order processing. */
public class OrderService extends BaseService implements Auditable {
    private final Store store;

    public OrderService(Store store) {
        this.store = store;
    }

    /** Processes a single order. */
    public Receipt processOrder(Order order) {
        if (order.isValid()) {
            return store.save(order);
        }
        return Receipt.empty();
    }
}
"#;
        let extraction = extract("/repo/OrderService.java", "OrderService.java", source).unwrap();
        let names: Vec<&str> = extraction.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["OrderService", "OrderService", "processOrder"]);

        let class = &extraction.objects[0];
        assert_eq!(class.object_type, ObjectType::Class);
        assert_eq!(
            class.docstring.as_deref(),
            Some("Coordinates order processing.")
        );

        let constructor = &extraction.objects[1];
        assert_eq!(constructor.object_type, ObjectType::Constructor);

        let method = &extraction.objects[2];
        assert_eq!(method.object_type, ObjectType::Method);
        assert_eq!(method.signature, "processOrder(Order order)");
        assert_eq!(
            method.qualified_name.as_deref(),
            Some("OrderService.processOrder")
        );

        let supertype_names: Vec<(&str, RelationKind)> = extraction
            .supertypes
            .iter()
            .map(|s| (s.target_name.as_str(), s.kind))
            .collect();
        assert!(supertype_names.contains(&("BaseService", RelationKind::Inherits)));
        assert!(supertype_names.contains(&("Auditable", RelationKind::Implements)));
    }

    #[test]
    fn enum_members_are_collected() {
        let source = r#"
public enum Status { PENDING, COMPLETED }
"#;
        let extraction = extract("/repo/Status.java", "Status.java", source).unwrap();
        assert_eq!(extraction.objects.len(), 1);
        let status = &extraction.objects[0];
        assert_eq!(status.object_type, ObjectType::Enum);
        assert_eq!(status.name, "Status");
        assert_eq!(status.ast_metadata.members, ["PENDING", "COMPLETED"]);
    }

    #[test]
    fn interfaces_emit_their_methods() {
        let source = r#"
public interface Auditable {
    void audit(String event);
}
"#;
        let extraction = extract("/repo/Auditable.java", "Auditable.java", source).unwrap();
        let names: Vec<&str> = extraction.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["Auditable", "audit"]);
        assert_eq!(extraction.objects[0].object_type, ObjectType::Interface);
    }

    #[test]
    fn no_top_level_functions_in_java() {
        let source = "public class Only {}\n";
        let extraction = extract("/repo/Only.java", "Only.java", source).unwrap();
        assert!(extraction
            .objects
            .iter()
            .all(|o| o.object_type != ObjectType::Function));
    }
}
