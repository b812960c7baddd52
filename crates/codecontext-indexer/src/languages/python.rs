use super::{FileExtraction, SupertypeEdge};
use crate::extract::{
    build_code_object, extract_ast_metadata, node_text, signature_text, AstSpec,
};
use crate::parser::parse_source;
use codecontext_core::error::ParseError;
use codecontext_core::languages::Language;
use codecontext_core::types::{ObjectType, RelationKind};
use tree_sitter::Node;

const SPEC: AstSpec = AstSpec {
    call_kinds: &["call"],
    call_name: python_call_name,
    reference_kinds: &["attribute"],
    branch_kinds: &[
        "if_statement",
        "elif_clause",
        "while_statement",
        "for_statement",
        "conditional_expression",
        "boolean_operator",
        "case_clause",
        "except_clause",
    ],
    nesting_kinds: &[
        "if_statement",
        "while_statement",
        "for_statement",
        "with_statement",
        "try_statement",
    ],
};

fn python_call_name(node: Node, source: &str) -> Option<String> {
    let function = node.child_by_field_name("function")?;
    match function.kind() {
        "identifier" => Some(node_text(function, source).to_string()),
        "attribute" => {
            let attr = function.child_by_field_name("attribute")?;
            Some(node_text(attr, source).to_string())
        }
        _ => None,
    }
}

pub fn extract(
    file_path: &str,
    relative_path: &str,
    source: &str,
) -> Result<FileExtraction, ParseError> {
    let tree = parse_source(source, Language::Python, relative_path)?;
    let root = tree.root_node();
    let mut extraction = FileExtraction::default();

    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "import_statement" | "import_from_statement" => {
                extraction.imports.push(node_text(child, source).to_string());
            }
            "function_definition" => {
                extract_function(child, source, file_path, relative_path, None, &mut extraction);
            }
            "class_definition" => {
                extract_class(child, source, file_path, relative_path, &mut extraction);
            }
            "decorated_definition" => {
                if let Some(definition) = child.child_by_field_name("definition") {
                    match definition.kind() {
                        "function_definition" => extract_function(
                            definition,
                            source,
                            file_path,
                            relative_path,
                            None,
                            &mut extraction,
                        ),
                        "class_definition" => extract_class(
                            definition,
                            source,
                            file_path,
                            relative_path,
                            &mut extraction,
                        ),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    Ok(extraction)
}

fn extract_function(
    node: Node,
    source: &str,
    file_path: &str,
    relative_path: &str,
    parent: Option<(&str, &str)>,
    extraction: &mut FileExtraction,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source).to_string();
    let body = node.child_by_field_name("body");
    let signature = signature_text(node, body, source);
    let docstring = body.and_then(|b| block_docstring(b, source));
    let metadata = extract_ast_metadata(node, source, &SPEC);

    let (object_type, qualified_name, parent_id) = match parent {
        Some((class_name, class_id)) => {
            let object_type = if name == "__init__" {
                ObjectType::Constructor
            } else {
                ObjectType::Method
            };
            (
                object_type,
                Some(format!("{class_name}.{name}")),
                Some(class_id.to_string()),
            )
        }
        None => (ObjectType::Function, Some(name.clone()), None),
    };

    extraction.objects.push(build_code_object(
        node,
        source,
        file_path,
        relative_path,
        Language::Python,
        object_type,
        name,
        qualified_name,
        signature,
        docstring,
        parent_id,
        metadata,
    ));
}

fn extract_class(
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
    let docstring = body.and_then(|b| block_docstring(b, source));
    let metadata = extract_ast_metadata(node, source, &SPEC);

    let class_object = build_code_object(
        node,
        source,
        file_path,
        relative_path,
        Language::Python,
        ObjectType::Class,
        name.clone(),
        Some(name.clone()),
        signature,
        docstring,
        None,
        metadata,
    );
    let class_id = class_object.id.clone();

    // Base classes: `class Tax(Base, mixins.Currency):`
    if let Some(superclasses) = node.child_by_field_name("superclasses") {
        let mut cursor = superclasses.walk();
        for argument in superclasses.named_children(&mut cursor) {
            let target = match argument.kind() {
                "identifier" => Some(node_text(argument, source).to_string()),
                "attribute" => argument
                    .child_by_field_name("attribute")
                    .map(|attr| node_text(attr, source).to_string()),
                _ => None,
            };
            if let Some(target_name) = target {
                extraction.supertypes.push(SupertypeEdge {
                    source_id: class_id.clone(),
                    target_name,
                    kind: RelationKind::Inherits,
                });
            }
        }
    }

    extraction.objects.push(class_object);

    if let Some(body) = body {
        let mut cursor = body.walk();
        for statement in body.named_children(&mut cursor) {
            let function = match statement.kind() {
                "function_definition" => Some(statement),
                "decorated_definition" => statement
                    .child_by_field_name("definition")
                    .filter(|d| d.kind() == "function_definition"),
                _ => None,
            };
            if let Some(function) = function {
                extract_function(
                    function,
                    source,
                    file_path,
                    relative_path,
                    Some((&name, &class_id)),
                    extraction,
                );
            }
        }
    }
}

/// First statement of a block when it is a string literal.
fn block_docstring(body: Node, source: &str) -> Option<String> {
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let expr = first.named_child(0)?;
    if expr.kind() != "string" {
        return None;
    }
    Some(strip_string_quotes(node_text(expr, source)))
}

fn strip_string_quotes(raw: &str) -> String {
    let trimmed = raw.trim();
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if trimmed.len() >= 2 * quote.len()
            && trimmed.starts_with(quote)
            && trimmed.ends_with(quote)
        {
            return trimmed[quote.len()..trimmed.len() - quote.len()]
                .trim()
                .to_string();
        }
    }
    trimmed.to_string()
}
