//! Shared extractor for JavaScript and TypeScript.
//!
//! TypeScript adds interfaces and enums on top of the JavaScript surface.
//! Arrow functions are emitted only when assigned to a top-level variable
//! declarator (the React component pattern); arrows nested inside other
//! functions or passed as arguments are not independent units.

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
    call_kinds: &["call_expression", "new_expression"],
    call_name: js_call_name,
    reference_kinds: &["member_expression"],
    branch_kinds: &[
        "if_statement",
        "while_statement",
        "for_statement",
        "for_in_statement",
        "switch_case",
        "ternary_expression",
        "catch_clause",
    ],
    nesting_kinds: &[
        "if_statement",
        "while_statement",
        "for_statement",
        "for_in_statement",
    ],
};

const DOC_COMMENT_KINDS: &[&str] = &["comment"];

fn js_call_name(node: Node, source: &str) -> Option<String> {
    let callee = node
        .child_by_field_name("function")
        .or_else(|| node.child_by_field_name("constructor"))?;
    match callee.kind() {
        "identifier" => Some(node_text(callee, source).to_string()),
        "member_expression" => callee
            .child_by_field_name("property")
            .map(|p| node_text(p, source).to_string()),
        _ => None,
    }
}

pub fn extract(
    file_path: &str,
    relative_path: &str,
    source: &str,
    language: Language,
) -> Result<FileExtraction, ParseError> {
    let tree = parse_source(source, language, relative_path)?;
    let root = tree.root_node();
    let mut extraction = FileExtraction::default();

    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        extract_top_level(child, source, file_path, relative_path, language, &mut extraction);
    }

    Ok(extraction)
}

fn extract_top_level(
    node: Node,
    source: &str,
    file_path: &str,
    relative_path: &str,
    language: Language,
    extraction: &mut FileExtraction,
) {
    match node.kind() {
        "import_statement" => {
            extraction.imports.push(node_text(node, source).to_string());
        }
        "export_statement" => {
            // Unwrap `export const X = …` / `export class X {}`.
            if let Some(declaration) = node.child_by_field_name("declaration") {
                extract_top_level(
                    declaration,
                    source,
                    file_path,
                    relative_path,
                    language,
                    extraction,
                );
            }
        }
        "class_declaration" => {
            extract_class(node, source, file_path, relative_path, language, extraction);
        }
        "function_declaration" | "generator_function_declaration" => {
            extract_function_declaration(node, source, file_path, relative_path, language, extraction);
        }
        "lexical_declaration" | "variable_declaration" => {
            // Top-of-module declarator context: only the outermost arrow
            // assigned here becomes a FUNCTION object.
            for declarator in find_children(node, &["variable_declarator"]) {
                extract_arrow_assignment(
                    declarator,
                    node,
                    source,
                    file_path,
                    relative_path,
                    language,
                    extraction,
                );
            }
        }
        "interface_declaration" if language == Language::TypeScript => {
            extract_interface(node, source, file_path, relative_path, extraction);
        }
        "enum_declaration" if language == Language::TypeScript => {
            extract_enum(node, source, file_path, relative_path, extraction);
        }
        _ => {}
    }
}

fn extract_class(
    node: Node,
    source: &str,
    file_path: &str,
    relative_path: &str,
    language: Language,
    extraction: &mut FileExtraction,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source).to_string();
    let body = node.child_by_field_name("body");
    let signature = signature_text(node, body, source);
    let docstring = class_doc_comment(node, source);
    let metadata = extract_ast_metadata(node, source, &SPEC);

    let class_object = build_code_object(
        node,
        source,
        file_path,
        relative_path,
        language,
        ObjectType::Class,
        name.clone(),
        Some(name.clone()),
        signature,
        docstring,
        None,
        metadata,
    );
    let class_id = class_object.id.clone();

    extract_heritage(node, source, &class_id, extraction);
    extraction.objects.push(class_object);

    if let Some(body) = body {
        for method in find_children(body, &["method_definition"]) {
            let Some(method_name_node) = method.child_by_field_name("name") else {
                continue;
            };
            let method_name = node_text(method_name_node, source).to_string();
            let object_type = if method_name == "constructor" {
                ObjectType::Constructor
            } else {
                ObjectType::Method
            };
            let method_body = method.child_by_field_name("body");
            let method_metadata = extract_ast_metadata(method, source, &SPEC);
            extraction.objects.push(build_code_object(
                method,
                source,
                file_path,
                relative_path,
                language,
                object_type,
                method_name.clone(),
                Some(format!("{name}.{method_name}")),
                signature_text(method, method_body, source),
                leading_doc_comment(method, source, DOC_COMMENT_KINDS),
                Some(class_id.clone()),
                method_metadata,
            ));
        }
    }
}

/// `extends` / `implements` clauses on a class declaration.
fn extract_heritage(node: Node, source: &str, class_id: &str, extraction: &mut FileExtraction) {
    let Some(heritage) = find_child(node, &["class_heritage"]) else {
        return;
    };
    let extends = find_children(heritage, &["extends_clause"]);
    let implements = find_children(heritage, &["implements_clause"]);

    if extends.is_empty() && implements.is_empty() {
        // Plain JavaScript: `class_heritage` is just `extends <expr>`.
        let text = node_text(heritage, source);
        let target = text.trim_start_matches("extends").trim();
        if !target.is_empty() {
            extraction.supertypes.push(SupertypeEdge {
                source_id: class_id.to_string(),
                target_name: target.split(['<', '(']).next().unwrap_or(target).trim().to_string(),
                kind: RelationKind::Inherits,
            });
        }
        return;
    }

    for (clauses, kind) in [
        (extends, RelationKind::Inherits),
        (implements, RelationKind::Implements),
    ] {
        for clause in clauses {
            let mut cursor = clause.walk();
            for target in clause.named_children(&mut cursor) {
                let text = node_text(target, source);
                let cleaned = text.split('<').next().unwrap_or(text).trim();
                if !cleaned.is_empty() {
                    extraction.supertypes.push(SupertypeEdge {
                        source_id: class_id.to_string(),
                        target_name: cleaned.to_string(),
                        kind,
                    });
                }
            }
        }
    }
}

fn extract_function_declaration(
    node: Node,
    source: &str,
    file_path: &str,
    relative_path: &str,
    language: Language,
    extraction: &mut FileExtraction,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source).to_string();
    let body = node.child_by_field_name("body");
    extraction.objects.push(build_code_object(
        node,
        source,
        file_path,
        relative_path,
        language,
        ObjectType::Function,
        name.clone(),
        Some(name),
        signature_text(node, body, source),
        class_doc_comment(node, source),
        None,
        extract_ast_metadata(node, source, &SPEC),
    ));
}

/// `const Name = (…) => …` at the top of the module.
fn extract_arrow_assignment(
    declarator: Node,
    declaration: Node,
    source: &str,
    file_path: &str,
    relative_path: &str,
    language: Language,
    extraction: &mut FileExtraction,
) {
    let Some(name_node) = declarator.child_by_field_name("name") else {
        return;
    };
    let Some(value) = declarator.child_by_field_name("value") else {
        return;
    };
    if value.kind() != "arrow_function" && value.kind() != "function_expression" {
        return;
    }
    let name = node_text(name_node, source).to_string();
    let body = value.child_by_field_name("body");
    // The chunk spans the whole declaration so the assignment reads complete.
    extraction.objects.push(build_code_object(
        declaration,
        source,
        file_path,
        relative_path,
        language,
        ObjectType::Function,
        name.clone(),
        Some(name),
        signature_text(declaration, body, source),
        class_doc_comment(declaration, source),
        None,
        extract_ast_metadata(value, source, &SPEC),
    ));
}

fn extract_interface(
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
    extraction.objects.push(build_code_object(
        node,
        source,
        file_path,
        relative_path,
        Language::TypeScript,
        ObjectType::Interface,
        name.clone(),
        Some(name),
        signature_text(node, body, source),
        class_doc_comment(node, source),
        None,
        extract_ast_metadata(node, source, &SPEC),
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
    let mut metadata = extract_ast_metadata(node, source, &SPEC);

    if let Some(body) = body {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            match member.kind() {
                "enum_assignment" => {
                    if let Some(member_name) = member.child_by_field_name("name") {
                        metadata.members.push(node_text(member_name, source).to_string());
                    }
                }
                "property_identifier" => {
                    metadata.members.push(node_text(member, source).to_string());
                }
                _ => {}
            }
        }
    }

    extraction.objects.push(build_code_object(
        node,
        source,
        file_path,
        relative_path,
        Language::TypeScript,
        ObjectType::Enum,
        name.clone(),
        Some(name),
        signature_text(node, body, source),
        class_doc_comment(node, source),
        None,
        metadata,
    ));
}

/// JSDoc block directly above a declaration; `export` wrappers keep the
/// comment above the export statement, so check the wrapper too.
fn class_doc_comment(node: Node, source: &str) -> Option<String> {
    leading_doc_comment(node, source, DOC_COMMENT_KINDS).or_else(|| {
        let parent = node.parent()?;
        if parent.kind() == "export_statement" {
            leading_doc_comment(parent, source, DOC_COMMENT_KINDS)
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrow_component_is_one_function_object() {
        let source = "export const LoadingIndicator = () => <Loading />;\n";
        let extraction =
            extract("/repo/Loading.tsx", "Loading.tsx", source, Language::TypeScript).unwrap();
        assert_eq!(extraction.objects.len(), 1);
        let component = &extraction.objects[0];
        assert_eq!(component.name, "LoadingIndicator");
        assert_eq!(component.object_type, ObjectType::Function);
    }

    #[test]
    fn nested_arrows_are_not_emitted() {
        let source = r#"
export const Outer = () => {
    const inner = () => 42;
    return inner();
};
"#;
        let extraction = extract("/repo/a.ts", "a.ts", source, Language::TypeScript).unwrap();
        let names: Vec<&str> = extraction.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["Outer"]);
    }

    #[test]
    fn classes_and_methods_are_extracted() {
        let source = r#"
/** Client for the orders API. */
export class OrderClient extends BaseClient {
    constructor(url) {
        super();
        this.url = url;
    }

    fetchOrder(id) {
        return this.get(`${this.url}/${id}`);
    }
}
"#;
        let extraction =
            extract("/repo/client.js", "client.js", source, Language::JavaScript).unwrap();
        let names: Vec<&str> = extraction.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["OrderClient", "constructor", "fetchOrder"]);
        assert_eq!(extraction.objects[0].object_type, ObjectType::Class);
        assert_eq!(extraction.objects[1].object_type, ObjectType::Constructor);
        assert_eq!(
            extraction.objects[2].qualified_name.as_deref(),
            Some("OrderClient.fetchOrder")
        );
        assert_eq!(extraction.supertypes.len(), 1);
        assert_eq!(extraction.supertypes[0].target_name, "BaseClient");
    }

    #[test]
    fn typescript_interfaces_and_enums() {
        let source = r#"
interface Order {
    id: string;
}

enum Status {
    Pending,
    Completed = "done",
}
"#;
        let extraction = extract("/repo/types.ts", "types.ts", source, Language::TypeScript).unwrap();
        let interface = extraction
            .objects
            .iter()
            .find(|o| o.object_type == ObjectType::Interface)
            .expect("interface");
        assert_eq!(interface.name, "Order");

        let status = extraction
            .objects
            .iter()
            .find(|o| o.object_type == ObjectType::Enum)
            .expect("enum");
        assert_eq!(status.name, "Status");
        assert_eq!(status.ast_metadata.members, ["Pending", "Completed"]);
    }

    #[test]
    fn top_level_function_declarations() {
        let source = "function calculateTax(amount) {\n  return amount * 0.2;\n}\n";
        let extraction = extract("/repo/tax.js", "tax.js", source, Language::JavaScript).unwrap();
        assert_eq!(extraction.objects.len(), 1);
        assert_eq!(extraction.objects[0].name, "calculateTax");
    }
}
