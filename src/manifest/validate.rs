//! Manifest and lockfile schema validation.
//!
//! The schema is a tree of [`SchemaNode`]s built once as data; validation
//! is a recursive walk that reports the failing dotted path and the type
//! mismatch. The walker never fixes data up.

use std::collections::BTreeMap;

use crate::core::Compiler;
use crate::error::{Error, Result};

/// The TOML value kinds the schema can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TomlType {
    Table,
    Array,
    String,
    Integer,
    Float,
    Boolean,
    Datetime,
}

impl TomlType {
    fn of(value: &toml::Value) -> TomlType {
        match value {
            toml::Value::Table(_) => TomlType::Table,
            toml::Value::Array(_) => TomlType::Array,
            toml::Value::String(_) => TomlType::String,
            toml::Value::Integer(_) => TomlType::Integer,
            toml::Value::Float(_) => TomlType::Float,
            toml::Value::Boolean(_) => TomlType::Boolean,
            toml::Value::Datetime(_) => TomlType::Datetime,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            TomlType::Table => "table",
            TomlType::Array => "array",
            TomlType::String => "string",
            TomlType::Integer => "integer",
            TomlType::Float => "float",
            TomlType::Boolean => "boolean",
            TomlType::Datetime => "datetime",
        }
    }
}

/// What a schema node accepts.
#[derive(Debug, Clone)]
pub enum SchemaType {
    /// Exactly one kind.
    Single(TomlType),

    /// An array whose elements are restricted; table elements may carry
    /// their own schema.
    Array {
        elements: Vec<TomlType>,
        table_schema: Option<SchemaMap>,
    },

    /// Any of the listed kinds.
    AnyOf(Vec<TomlType>),
}

/// One node of the schema tree.
#[derive(Debug, Clone)]
pub struct SchemaNode {
    pub required: bool,
    pub ty: SchemaType,

    /// Child schemas for table nodes. A `"*"` key applies to keys not
    /// listed explicitly.
    pub children: SchemaMap,
}

pub type SchemaMap = BTreeMap<String, SchemaNode>;

impl SchemaNode {
    fn new(required: bool, ty: SchemaType) -> SchemaNode {
        SchemaNode {
            required,
            ty,
            children: SchemaMap::new(),
        }
    }

    pub fn string() -> SchemaNode {
        SchemaNode::new(false, SchemaType::Single(TomlType::String))
    }

    pub fn required_string() -> SchemaNode {
        SchemaNode::new(true, SchemaType::Single(TomlType::String))
    }

    pub fn boolean() -> SchemaNode {
        SchemaNode::new(false, SchemaType::Single(TomlType::Boolean))
    }

    pub fn string_array() -> SchemaNode {
        SchemaNode::new(
            false,
            SchemaType::Array {
                elements: vec![TomlType::String],
                table_schema: None,
            },
        )
    }

    /// Array of strings or inline tables (source entries, lib entries).
    pub fn mixed_array(table_schema: SchemaMap) -> SchemaNode {
        SchemaNode::new(
            false,
            SchemaType::Array {
                elements: vec![TomlType::String, TomlType::Table],
                table_schema: Some(table_schema),
            },
        )
    }

    pub fn table(children: SchemaMap) -> SchemaNode {
        SchemaNode {
            required: false,
            ty: SchemaType::Single(TomlType::Table),
            children,
        }
    }

    pub fn table_array(table_schema: SchemaMap) -> SchemaNode {
        SchemaNode::new(
            false,
            SchemaType::Array {
                elements: vec![TomlType::Table],
                table_schema: Some(table_schema),
            },
        )
    }

    pub fn any_of(types: Vec<TomlType>) -> SchemaNode {
        SchemaNode::new(false, SchemaType::AnyOf(types))
    }

    pub fn required(mut self) -> SchemaNode {
        self.required = true;
        self
    }
}

fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn check_node(value: &toml::Value, node: &SchemaNode, path: &str) -> Result<()> {
    let found = TomlType::of(value);

    match &node.ty {
        SchemaType::Single(expected) => {
            if found != *expected {
                return Err(Error::type_mismatch(path, expected.name(), found.name()));
            }
        }
        SchemaType::AnyOf(types) => {
            if !types.contains(&found) {
                let expected = types
                    .iter()
                    .map(|t| t.name())
                    .collect::<Vec<_>>()
                    .join(" or ");
                return Err(Error::type_mismatch(path, expected, found.name()));
            }
        }
        SchemaType::Array {
            elements,
            table_schema,
        } => {
            let arr = value
                .as_array()
                .ok_or_else(|| Error::type_mismatch(path, "array", found.name()))?;
            for (index, item) in arr.iter().enumerate() {
                let item_type = TomlType::of(item);
                if !elements.contains(&item_type) {
                    let expected = elements
                        .iter()
                        .map(|t| t.name())
                        .collect::<Vec<_>>()
                        .join(" or ");
                    return Err(Error::type_mismatch(
                        &format!("{path}[{index}]"),
                        expected,
                        item_type.name(),
                    ));
                }
                if let (Some(schema), Some(table)) = (table_schema, item.as_table()) {
                    validate_table(table, schema, &format!("{path}[{index}]"))?;
                }
            }
        }
    }

    if let Some(table) = value.as_table() {
        if !node.children.is_empty() {
            validate_table(table, &node.children, path)?;
        }
    }

    Ok(())
}

/// Walk a table against a schema map. `"*"` wildcard children apply to
/// keys the schema does not list.
pub fn validate_table(
    data: &toml::value::Table,
    schema: &SchemaMap,
    parent_path: &str,
) -> Result<()> {
    let wildcard = schema.get("*");

    for (key, node) in schema {
        if key == "*" {
            continue;
        }
        let path = join_path(parent_path, key);
        match data.get(key) {
            Some(value) => check_node(value, node, &path)?,
            None => {
                if node.required {
                    return Err(Error::required_key_missing(&path));
                }
            }
        }
    }

    if let Some(wildcard) = wildcard {
        for (key, value) in data {
            if schema.contains_key(key) {
                continue;
            }
            let path = join_path(parent_path, key);
            check_node(value, wildcard, &path)?;
        }
    }

    Ok(())
}

fn base_fields_schema() -> SchemaMap {
    let source_entry = SchemaMap::from([
        ("path".to_string(), SchemaNode::required_string()),
        ("cflags".to_string(), SchemaNode::string_array()),
    ]);
    let lib_entry = SchemaMap::from([
        ("path".to_string(), SchemaNode::string()),
        ("platform".to_string(), SchemaNode::string()),
        ("compiler".to_string(), SchemaNode::string()),
    ]);

    SchemaMap::from([
        ("include".to_string(), SchemaNode::string_array()),
        ("sources".to_string(), SchemaNode::mixed_array(source_entry.clone())),
        ("modules".to_string(), SchemaNode::mixed_array(source_entry)),
        ("cflags".to_string(), SchemaNode::string_array()),
        ("cxxflags".to_string(), SchemaNode::string_array()),
        ("aflags".to_string(), SchemaNode::string_array()),
        ("lflags".to_string(), SchemaNode::string_array()),
        ("defines".to_string(), SchemaNode::string_array()),
        ("undefines".to_string(), SchemaNode::string_array()),
        ("libs".to_string(), SchemaNode::mixed_array(lib_entry)),
    ])
}

fn dependency_entry_schema() -> SchemaNode {
    let detail = SchemaMap::from([
        ("version".to_string(), SchemaNode::string()),
        ("git".to_string(), SchemaNode::string()),
        ("path".to_string(), SchemaNode::string()),
        ("features".to_string(), SchemaNode::string_array()),
        ("libs".to_string(), SchemaNode::string_array()),
        ("system".to_string(), SchemaNode::boolean()),
    ]);
    let mut node = SchemaNode::any_of(vec![TomlType::String, TomlType::Table]);
    node.children = detail;
    node
}

/// The schema for `muuk.toml`.
pub fn muuk_schema() -> SchemaMap {
    let mut package_children = SchemaMap::from([
        ("name".to_string(), SchemaNode::required_string()),
        ("version".to_string(), SchemaNode::required_string()),
        ("cxx_standard".to_string(), SchemaNode::string()),
        ("description".to_string(), SchemaNode::string()),
        ("license".to_string(), SchemaNode::string()),
        ("authors".to_string(), SchemaNode::string_array()),
        ("repository".to_string(), SchemaNode::string()),
        ("documentation".to_string(), SchemaNode::string()),
        ("homepage".to_string(), SchemaNode::string()),
        ("readme".to_string(), SchemaNode::string()),
        ("keywords".to_string(), SchemaNode::string_array()),
        ("git".to_string(), SchemaNode::string()),
    ]);
    package_children.insert("*".to_string(), SchemaNode::any_of(vec![
        TomlType::String,
        TomlType::Array,
        TomlType::Boolean,
    ]));

    let mut library_children = base_fields_schema();
    library_children.insert("link".to_string(), SchemaNode::string());
    library_children.insert(
        "compiler".to_string(),
        SchemaNode::table(SchemaMap::from([(
            "*".to_string(),
            SchemaNode::table(base_fields_schema()),
        )])),
    );
    library_children.insert(
        "platform".to_string(),
        SchemaNode::table(SchemaMap::from([(
            "*".to_string(),
            SchemaNode::table(base_fields_schema()),
        )])),
    );

    let mut build_children = base_fields_schema();
    build_children.insert("name".to_string(), SchemaNode::required_string());
    build_children.insert("profiles".to_string(), SchemaNode::string_array());
    build_children.insert("link".to_string(), SchemaNode::string());
    build_children.insert(
        "dependencies".to_string(),
        SchemaNode::any_of(vec![TomlType::Array, TomlType::Table]),
    );

    let external_children = SchemaMap::from([
        ("name".to_string(), SchemaNode::required_string()),
        ("version".to_string(), SchemaNode::string()),
        ("type".to_string(), SchemaNode::required_string()),
        ("path".to_string(), SchemaNode::required_string()),
        ("args".to_string(), SchemaNode::string_array()),
        (
            "outputs".to_string(),
            SchemaNode::mixed_array(SchemaMap::from([
                ("path".to_string(), SchemaNode::string()),
                ("profile".to_string(), SchemaNode::string()),
            ])),
        ),
        ("profiles".to_string(), SchemaNode::string_array()),
    ]);

    let mut profile_children = base_fields_schema();
    profile_children.insert(
        "inherits".to_string(),
        SchemaNode::any_of(vec![TomlType::String, TomlType::Array]),
    );
    profile_children.insert("default".to_string(), SchemaNode::boolean());
    profile_children.insert(
        "compiler".to_string(),
        SchemaNode::table(SchemaMap::from([(
            "*".to_string(),
            SchemaNode::table(base_fields_schema()),
        )])),
    );
    profile_children.insert(
        "platform".to_string(),
        SchemaNode::table(SchemaMap::from([(
            "*".to_string(),
            SchemaNode::table(base_fields_schema()),
        )])),
    );

    SchemaMap::from([
        (
            "package".to_string(),
            SchemaNode::table(package_children).required(),
        ),
        (
            "dependencies".to_string(),
            SchemaNode::table(SchemaMap::from([(
                "*".to_string(),
                dependency_entry_schema(),
            )])),
        ),
        ("library".to_string(), SchemaNode::table(library_children)),
        ("build".to_string(), SchemaNode::table_array(build_children)),
        (
            "external".to_string(),
            SchemaNode::table_array(external_children),
        ),
        (
            "profile".to_string(),
            SchemaNode::table(SchemaMap::from([(
                "*".to_string(),
                SchemaNode::table(profile_children),
            )])),
        ),
        (
            "features".to_string(),
            SchemaNode::table(SchemaMap::from([(
                "*".to_string(),
                SchemaNode::any_of(vec![TomlType::Array, TomlType::Table]),
            )])),
        ),
        (
            "compiler".to_string(),
            SchemaNode::table(SchemaMap::from([(
                "*".to_string(),
                SchemaNode::table(base_fields_schema()),
            )])),
        ),
        (
            "platform".to_string(),
            SchemaNode::table(SchemaMap::from([(
                "*".to_string(),
                SchemaNode::table(base_fields_schema()),
            )])),
        ),
        (
            "scripts".to_string(),
            SchemaNode::table(SchemaMap::from([("*".to_string(), SchemaNode::string())])),
        ),
    ])
}

/// The schema for the Cargo-style `muuk.lock`.
pub fn muuk_lock_schema() -> SchemaMap {
    let package_children = SchemaMap::from([
        ("name".to_string(), SchemaNode::required_string()),
        ("version".to_string(), SchemaNode::required_string()),
        ("source".to_string(), SchemaNode::string()),
        ("features".to_string(), SchemaNode::string_array()),
        (
            "dependencies".to_string(),
            SchemaNode::table_array(SchemaMap::from([
                ("name".to_string(), SchemaNode::required_string()),
                ("version".to_string(), SchemaNode::string()),
            ])),
        ),
    ]);

    SchemaMap::from([(
        "package".to_string(),
        SchemaNode::table_array(package_children),
    )])
}

/// Validate a parsed `muuk.toml`, including the rules the schema walker
/// cannot express: dependency naming and per-compiler flag shapes.
pub fn validate_muuk_toml(data: &toml::Value) -> Result<()> {
    let table = data
        .as_table()
        .ok_or_else(|| Error::type_mismatch("", "table", data.type_str()))?;

    validate_table(table, &muuk_schema(), "")?;

    if let Some(deps) = table.get("dependencies").and_then(|v| v.as_table()) {
        for name in deps.keys() {
            if !is_valid_dependency_name(name) {
                return Err(Error::new(format!("invalid dependency name: `{name}`")));
            }
        }
    }

    // Flags inside compiler-specific sub-trees can be checked against that
    // compiler's conventions.
    for node in [table.get("library"), Some(data)].into_iter().flatten() {
        let Some(compilers) = node.get("compiler").and_then(|v| v.as_table()) else {
            continue;
        };
        for (compiler_key, section) in compilers {
            let Ok(compiler) = compiler_key.parse::<Compiler>() else {
                continue;
            };
            for key in ["cflags", "cxxflags", "lflags", "aflags"] {
                if let Some(flags) = section.get(key).and_then(|v| v.as_array()) {
                    for flag in flags.iter().filter_map(|v| v.as_str()) {
                        validate_flag(compiler, flag)?;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Validate a parsed `muuk.lock`.
pub fn validate_muuk_lock(data: &toml::Value) -> Result<()> {
    let table = data
        .as_table()
        .ok_or_else(|| Error::type_mismatch("", "table", data.type_str()))?;
    validate_table(table, &muuk_lock_schema(), "")
}

/// Dependency name rules:
/// alphanumeric ends, at most one `/`, `+` zero or exactly twice and
/// adjacent, `.` wrapped by digits, no consecutive non-alphanumerics
/// except the `++` pair.
pub fn is_valid_dependency_name(name: &str) -> bool {
    const ALLOWED: [char; 5] = ['-', '_', '/', '.', '+'];

    let bytes: Vec<char> = name.chars().collect();
    if bytes.is_empty() {
        return false;
    }
    if !bytes[0].is_ascii_alphanumeric() {
        return false;
    }
    let last = *bytes.last().unwrap();
    if !last.is_ascii_alphanumeric() && last != '+' {
        return false;
    }

    let mut prev_non_alnum = false;
    for &c in &bytes {
        if !c.is_ascii_alphanumeric() && !ALLOWED.contains(&c) {
            return false;
        }
        if !c.is_ascii_alphanumeric() {
            if prev_non_alnum && c != '+' {
                return false;
            }
            prev_non_alnum = true;
        } else {
            prev_non_alnum = false;
        }
    }

    // `.` must be wrapped by digits.
    for i in 1..bytes.len().saturating_sub(1) {
        if bytes[i] == '.'
            && (!bytes[i - 1].is_ascii_digit() || !bytes[i + 1].is_ascii_digit())
        {
            return false;
        }
    }

    let slashes = bytes.iter().filter(|&&c| c == '/').count();
    if slashes > 1 {
        return false;
    }

    let plus_count = bytes.iter().filter(|&&c| c == '+').count();
    if plus_count != 0 && plus_count != 2 {
        return false;
    }
    if plus_count == 2 {
        let first = name.find('+').unwrap();
        let second = name.rfind('+').unwrap();
        if first + 1 != second {
            return false;
        }
    }

    true
}

/// Validate one compiler flag against a compiler's conventions.
pub fn validate_flag(compiler: Compiler, flag: &str) -> Result<()> {
    if flag.is_empty() {
        return Err(Error::new(format!(
            "{} compiler flag must not be empty",
            compiler.command()
        )));
    }

    let first = flag.chars().next().unwrap();
    match compiler {
        Compiler::Msvc => {
            if first != '/' && first != '-' {
                return Err(Error::new(format!(
                    "{} compiler flag (`{flag}`) must start with `/`",
                    compiler.command()
                )));
            }
        }
        _ => {
            if first != '-' {
                return Err(Error::new(format!(
                    "{} compiler flag (`{flag}`) must start with `-`",
                    compiler.command()
                )));
            }
        }
    }

    for c in flag.chars() {
        let allowed =
            c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '=' | '+' | '_' | '.' | ':');
        if !allowed {
            return Err(Error::new(format!(
                "{} compiler flag (`{flag}`) contains invalid characters",
                compiler.command()
            )));
        }
    }

    Ok(())
}
