//! Language Registry - single source of truth for all per-language data.
//!
//! ARCHITECTURE: This is the ONLY module that maps normalized, language-neutral
//! concepts (kinds, extensions) onto concrete tree-sitter grammars and node
//! types. Adding a new language requires:
//! 1. Add a variant to `Language`.
//! 2. Add the tree-sitter grammar crate to Cargo.toml + `to_tree_sitter()`.
//! 3. Add file extensions in `detect_language()`.
//! 4. Add a row to the `node_types()` table for every `NormalizedKind`.
//! 5. Add `symbol_query()` / `import_query()` S-expressions.
//!
//! Design decision: cross-language portability is restricted to this
//! explicit table. Unsupported (kind, language) combinations return an
//! empty node-type list rather than guess at an approximate mapping.

use std::path::Path;

/// Supported programming languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Java,
    Go,
    Rust,
    Ruby,
    Php,
    C,
    Cpp,
}

impl Language {
    /// Detect language from a file extension (without the leading dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "py" | "pyi" => Some(Self::Python),
            "js" | "jsx" => Some(Self::JavaScript),
            "ts" => Some(Self::TypeScript),
            "tsx" => Some(Self::Tsx),
            "java" => Some(Self::Java),
            "go" => Some(Self::Go),
            "rs" => Some(Self::Rust),
            "rb" => Some(Self::Ruby),
            "php" => Some(Self::Php),
            "c" | "h" => Some(Self::C),
            "cpp" | "cxx" | "cc" | "hpp" | "hxx" => Some(Self::Cpp),
            _ => None,
        }
    }

    /// Detect language from a file path.
    ///
    /// # Security
    /// Rejects paths containing parent-directory traversal components (`..`).
    /// Absolute paths are allowed.
    pub fn from_path(path: &Path) -> Option<Self> {
        use std::path::Component;

        for component in path.components() {
            if matches!(component, Component::ParentDir) {
                return None;
            }
        }

        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Human-readable language name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Python => "Python",
            Self::JavaScript => "JavaScript",
            Self::TypeScript => "TypeScript",
            Self::Tsx => "TSX",
            Self::Java => "Java",
            Self::Go => "Go",
            Self::Rust => "Rust",
            Self::Ruby => "Ruby",
            Self::Php => "PHP",
            Self::C => "C",
            Self::Cpp => "C++",
        }
    }

    /// Convert to a tree-sitter `Language`.
    ///
    /// ARCHITECTURE: This is the ONLY place where tree-sitter grammars are loaded.
    pub fn to_tree_sitter(self) -> tree_sitter::Language {
        match self {
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Self::Java => tree_sitter_java::LANGUAGE.into(),
            Self::Go => tree_sitter_go::LANGUAGE.into(),
            Self::Rust => tree_sitter_rust::LANGUAGE.into(),
            Self::Ruby => tree_sitter_ruby::LANGUAGE.into(),
            Self::Php => tree_sitter_php::LANGUAGE_PHP.into(),
            Self::C => tree_sitter_c::LANGUAGE.into(),
            Self::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        }
    }
}

/// Language-neutral node-kind abstraction used by locators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NormalizedKind {
    Function,
    Class,
    Method,
    Import,
    Statement,
    Interface,
    Enum,
}

/// Get the concrete tree-sitter node types for a `(kind, language)` pair.
///
/// Returns an empty slice when the kind is not representable in the language
/// (e.g. `class` in Go) — callers must treat this as "no match", never guess.
pub fn node_types(kind: NormalizedKind, language: Language) -> &'static [&'static str] {
    use Language::*;
    use NormalizedKind::*;

    match (kind, language) {
        (Function, Python) => &["function_definition"],
        (Class, Python) => &["class_definition"],
        (Method, Python) => &["function_definition"],
        (Import, Python) => &["import_statement", "import_from_statement"],
        (Statement, Python) => &[
            "if_statement",
            "for_statement",
            "while_statement",
            "with_statement",
            "try_statement",
            "return_statement",
            "raise_statement",
            "expression_statement",
            "assignment",
        ],
        (Interface, Python) => &[],
        (Enum, Python) => &[],

        (Function, JavaScript) => &[
            "function_declaration",
            "function_expression",
            "arrow_function",
            "generator_function_declaration",
        ],
        (Class, JavaScript) => &["class_declaration"],
        (Method, JavaScript) => &["method_definition"],
        (Import, JavaScript) => &["import_statement"],
        (Statement, JavaScript) => &[
            "if_statement",
            "for_statement",
            "for_in_statement",
            "while_statement",
            "do_statement",
            "return_statement",
            "expression_statement",
            "switch_statement",
            "try_statement",
            "throw_statement",
        ],
        (Interface, JavaScript) => &[],
        (Enum, JavaScript) => &[],

        (Function, TypeScript | Tsx) => &[
            "function_declaration",
            "function_expression",
            "arrow_function",
        ],
        (Class, TypeScript | Tsx) => &["class_declaration"],
        (Method, TypeScript | Tsx) => &["method_definition", "method_signature"],
        (Import, TypeScript | Tsx) => &["import_statement"],
        (Statement, TypeScript | Tsx) => &[
            "if_statement",
            "for_statement",
            "for_in_statement",
            "while_statement",
            "do_statement",
            "return_statement",
            "expression_statement",
            "switch_statement",
            "try_statement",
            "throw_statement",
        ],
        (Interface, TypeScript | Tsx) => &["interface_declaration"],
        (Enum, TypeScript | Tsx) => &["enum_declaration"],

        (Function, Java) => &["method_declaration", "constructor_declaration"],
        (Class, Java) => &["class_declaration"],
        (Method, Java) => &["method_declaration"],
        (Import, Java) => &["import_declaration"],
        (Statement, Java) => &[
            "if_statement",
            "for_statement",
            "enhanced_for_statement",
            "while_statement",
            "return_statement",
            "expression_statement",
            "try_statement",
            "throw_statement",
            "switch_expression",
        ],
        (Interface, Java) => &["interface_declaration"],
        (Enum, Java) => &["enum_declaration"],

        (Function, Go) => &["function_declaration"],
        // Go has no classes - empty, not a guessed substitute.
        (Class, Go) => &[],
        (Method, Go) => &["method_declaration"],
        (Import, Go) => &["import_declaration"],
        (Statement, Go) => &[
            "if_statement",
            "for_statement",
            "return_statement",
            "expression_statement",
            "switch_statement",
            "select_statement",
        ],
        (Interface, Go) => &["interface_type"],
        (Enum, Go) => &[],

        (Function, Rust) => &["function_item"],
        (Class, Rust) => &["struct_item"],
        (Method, Rust) => &["function_item"],
        (Import, Rust) => &["use_declaration"],
        (Statement, Rust) => &[
            "if_expression",
            "for_expression",
            "while_expression",
            "return_expression",
            "expression_statement",
            "match_expression",
            "let_declaration",
        ],
        (Interface, Rust) => &["trait_item"],
        (Enum, Rust) => &["enum_item"],

        (Function, Ruby) => &["method"],
        (Class, Ruby) => &["class"],
        (Method, Ruby) => &["method", "singleton_method"],
        // Ruby's `require`/`require_relative` are method calls, not import
        // syntax - not representable as a locator kind.
        (Import, Ruby) => &[],
        (Statement, Ruby) => &[
            "if",
            "unless",
            "for",
            "while",
            "return",
            "method_call",
        ],
        (Interface, Ruby) => &[],
        (Enum, Ruby) => &[],

        (Function, Php) => &["function_definition"],
        (Class, Php) => &["class_declaration"],
        (Method, Php) => &["method_declaration"],
        (Import, Php) => &["namespace_use_declaration"],
        (Statement, Php) => &[
            "if_statement",
            "for_statement",
            "foreach_statement",
            "while_statement",
            "return_statement",
            "expression_statement",
            "switch_statement",
        ],
        (Interface, Php) => &["interface_declaration"],
        (Enum, Php) => &["enum_declaration"],

        (Function, C) => &["function_definition"],
        (Class, C) => &[],
        (Method, C) => &[],
        (Import, C) => &["preproc_include"],
        (Statement, C) => &[
            "if_statement",
            "for_statement",
            "while_statement",
            "do_statement",
            "return_statement",
            "expression_statement",
            "switch_statement",
        ],
        (Interface, C) => &[],
        (Enum, C) => &["enum_specifier"],

        (Function, Cpp) => &["function_definition"],
        (Class, Cpp) => &["class_specifier"],
        (Method, Cpp) => &["function_definition"],
        (Import, Cpp) => &["preproc_include"],
        (Statement, Cpp) => &[
            "if_statement",
            "for_statement",
            "while_statement",
            "do_statement",
            "return_statement",
            "expression_statement",
            "switch_statement",
            "try_statement",
        ],
        (Interface, Cpp) => &[],
        (Enum, Cpp) => &["enum_specifier"],
    }
}

/// The capture-tag classification used by `symbol_query`: `@function.def`,
/// `@class.def`, or `@type.def` (interfaces, enums, type aliases).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Function,
    Class,
    Type,
}

impl SymbolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Type => "type",
        }
    }
}

/// S-expression query that captures definition nodes tagged by kind.
///
/// Capture names follow `@<kind>.def` with `@name` on the identifier child;
/// the graph builder finds the innermost `*.def` ancestor capture for a
/// `@name` match to classify it (see spec.md §4.3).
pub fn symbol_query(language: Language) -> &'static str {
    match language {
        Language::Python => {
            "(function_definition name: (identifier) @name) @function.def
             (class_definition name: (identifier) @name) @class.def"
        }
        Language::JavaScript => {
            "(function_declaration name: (identifier) @name) @function.def
             (class_declaration name: (identifier) @name) @class.def
             (method_definition name: (property_identifier) @name) @function.def"
        }
        Language::TypeScript | Language::Tsx => {
            "(function_declaration name: (identifier) @name) @function.def
             (class_declaration name: (identifier) @name) @class.def
             (method_definition name: (property_identifier) @name) @function.def
             (interface_declaration name: (type_identifier) @name) @type.def
             (enum_declaration name: (identifier) @name) @type.def
             (type_alias_declaration name: (type_identifier) @name) @type.def"
        }
        Language::Java => {
            "(class_declaration name: (identifier) @name) @class.def
             (interface_declaration name: (identifier) @name) @type.def
             (enum_declaration name: (identifier) @name) @type.def
             (method_declaration name: (identifier) @name) @function.def"
        }
        Language::Go => {
            "(function_declaration name: (identifier) @name) @function.def
             (method_declaration name: (field_identifier) @name) @function.def
             (type_spec name: (type_identifier) @name) @type.def"
        }
        Language::Rust => {
            "(function_item name: (identifier) @name) @function.def
             (struct_item name: (type_identifier) @name) @class.def
             (trait_item name: (type_identifier) @name) @type.def
             (enum_item name: (type_identifier) @name) @type.def"
        }
        Language::Ruby => {
            "(method name: (identifier) @name) @function.def
             (singleton_method name: (identifier) @name) @function.def
             (class name: (constant) @name) @class.def"
        }
        Language::Php => {
            "(function_definition name: (name) @name) @function.def
             (class_declaration name: (name) @name) @class.def
             (interface_declaration name: (name) @name) @type.def
             (enum_declaration name: (name) @name) @type.def
             (method_declaration name: (name) @name) @function.def"
        }
        Language::C => {
            "(function_definition declarator: (function_declarator declarator: (identifier) @name)) @function.def
             (enum_specifier name: (type_identifier) @name) @type.def"
        }
        Language::Cpp => {
            "(function_definition declarator: (function_declarator declarator: (identifier) @name)) @function.def
             (class_specifier name: (type_identifier) @name) @class.def
             (enum_specifier name: (type_identifier) @name) @type.def"
        }
    }
}

/// S-expression query capturing import/include nodes (captured whole; the
/// module/symbol text is pulled out of the raw node text per spec.md §4.3).
pub fn import_query(language: Language) -> &'static str {
    match language {
        Language::Python => "[(import_statement) (import_from_statement)] @import",
        Language::JavaScript | Language::TypeScript | Language::Tsx => "(import_statement) @import",
        Language::Java => "(import_declaration) @import",
        Language::Go => "(import_spec) @import",
        Language::Rust => "(use_declaration) @import",
        Language::Ruby => "(call method: (identifier) @_m (#match? @_m \"^require\")) @import",
        Language::Php => "(namespace_use_declaration) @import",
        Language::C | Language::Cpp => "(preproc_include) @import",
    }
}

/// Map a raw tree-sitter node type to a normalized per-line construct tag,
/// used to populate `Graph.line_kinds`. Returns `None` for node types that
/// do not correspond to one of the normalized statement-ish kinds worth
/// tagging (e.g. punctuation tokens).
pub fn line_kind(language: Language, node_type: &str) -> Option<&'static str> {
    for kind in [
        NormalizedKind::Statement,
        NormalizedKind::Function,
        NormalizedKind::Class,
        NormalizedKind::Interface,
        NormalizedKind::Enum,
        NormalizedKind::Import,
    ] {
        if node_types(kind, language).contains(&node_type) {
            return Some(match kind {
                NormalizedKind::Statement => static_statement_tag(node_type),
                NormalizedKind::Function => "function",
                NormalizedKind::Class => "class",
                NormalizedKind::Interface => "interface",
                NormalizedKind::Enum => "enum",
                NormalizedKind::Import => "import",
                NormalizedKind::Method => unreachable!(),
            });
        }
    }
    None
}

/// Statement node types are tagged with their own type name (e.g.
/// `if_statement`, `for_statement`) rather than a single generic "statement"
/// tag, since spec.md §3 calls out `if_statement`/`for_statement` as example
/// `line_kinds` values.
fn static_statement_tag(node_type: &str) -> &'static str {
    match node_type {
        "if_statement" | "if_expression" | "if" => "if_statement",
        "for_statement" | "for_expression" | "for_in_statement" | "foreach_statement" | "for" => {
            "for_statement"
        }
        "while_statement" | "while_expression" | "while" => "while_statement",
        "do_statement" => "do_statement",
        "return_statement" | "return_expression" | "return" => "return_statement",
        "raise_statement" => "raise_statement",
        "throw_statement" => "throw_statement",
        "try_statement" => "try_statement",
        "with_statement" => "with_statement",
        "switch_statement" | "switch_expression" => "switch_statement",
        "select_statement" => "select_statement",
        "expression_statement" => "expression_statement",
        "assignment" | "let_declaration" => "assignment",
        "match_expression" => "match_expression",
        "unless" => "unless_statement",
        "method_call" => "expression_statement",
        other => {
            // Fenced fallback: still tag something meaningful rather than
            // silently dropping a statement node from line_kinds.
            Box::leak(other.to_string().into_boxed_str())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_all_extensions() {
        assert_eq!(Language::from_extension("py"), Some(Language::Python));
        assert_eq!(Language::from_extension("rs"), Some(Language::Rust));
        assert_eq!(Language::from_extension("ts"), Some(Language::TypeScript));
        assert_eq!(Language::from_extension("tsx"), Some(Language::Tsx));
        assert_eq!(Language::from_extension("unknown"), None);
    }

    #[test]
    fn rejects_parent_dir_traversal() {
        assert_eq!(Language::from_path(Path::new("../etc/passwd.py")), None);
    }

    #[test]
    fn go_has_no_class_kind() {
        assert!(node_types(NormalizedKind::Class, Language::Go).is_empty());
    }

    #[test]
    fn python_has_no_interface_kind() {
        assert!(node_types(NormalizedKind::Interface, Language::Python).is_empty());
    }

    #[test]
    fn rust_function_maps_to_function_item() {
        assert_eq!(
            node_types(NormalizedKind::Function, Language::Rust),
            &["function_item"]
        );
    }
}
