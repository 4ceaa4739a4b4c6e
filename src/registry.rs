//! Standard-library registry
//!
//! A static, read-only table of the built-in objects, their methods and
//! their properties. The semantic analyzer consults it to validate member
//! access and call arity; the code generator consults it to synthesize the
//! external runtime symbols (`textwindow_writeline`, `clock_date_get`, ...).
//!
//! All name lookups are case-insensitive. The table is built once per
//! [`Registry`] value and never mutated afterwards.

use std::collections::HashMap;

/// Parameter kind of a built-in method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Number,
    String,
    /// Wildcard: accepts any value kind
    Any,
}

/// Return kind of a built-in method or property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnType {
    Void,
    Number,
    String,
}

/// Signature of a built-in method
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub params: Vec<ParamType>,
    pub return_type: ReturnType,
}

/// Description of a built-in property
#[derive(Debug, Clone, Copy)]
pub struct PropertyInfo {
    pub return_type: ReturnType,
    pub read_only: bool,
}

/// The built-in object table, keyed by lowercased (object, member) names
#[derive(Debug)]
pub struct Registry {
    functions: HashMap<&'static str, HashMap<&'static str, FunctionInfo>>,
    properties: HashMap<&'static str, HashMap<&'static str, PropertyInfo>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        use ParamType::*;
        use ReturnType as Ret;

        let function = |params: &[ParamType], return_type: Ret| FunctionInfo {
            params: params.to_vec(),
            return_type,
        };

        let mut functions: HashMap<&'static str, HashMap<&'static str, FunctionInfo>> =
            HashMap::new();
        functions.insert(
            "textwindow",
            HashMap::from([
                ("writeline", function(&[Any], Ret::Void)),
                ("write", function(&[Any], Ret::Void)),
                ("read", function(&[], Ret::String)),
                ("pause", function(&[], Ret::Void)),
                ("clear", function(&[], Ret::Void)),
            ]),
        );
        functions.insert("math", HashMap::from([("abs", function(&[Number], Ret::Number))]));
        functions.insert(
            "program",
            HashMap::from([
                ("delay", function(&[Number], Ret::Void)),
                ("getargument", function(&[Number], Ret::String)),
                ("end", function(&[], Ret::Void)),
            ]),
        );
        functions.insert("array", HashMap::from([("count", function(&[Any], Ret::Number))]));

        let mut properties: HashMap<&'static str, HashMap<&'static str, PropertyInfo>> =
            HashMap::new();
        properties.insert(
            "textwindow",
            HashMap::from([(
                "title",
                PropertyInfo {
                    return_type: Ret::String,
                    read_only: false,
                },
            )]),
        );
        properties.insert(
            "clock",
            HashMap::from([(
                "date",
                PropertyInfo {
                    return_type: Ret::Number,
                    read_only: true,
                },
            )]),
        );
        properties.insert(
            "program",
            HashMap::from([(
                "argumentcount",
                PropertyInfo {
                    return_type: Ret::Number,
                    read_only: true,
                },
            )]),
        );

        Self {
            functions,
            properties,
        }
    }

    pub fn has_object(&self, object: &str) -> bool {
        let object = object.to_lowercase();
        self.functions.contains_key(object.as_str()) || self.properties.contains_key(object.as_str())
    }

    pub fn has_function(&self, object: &str, function: &str) -> bool {
        self.get_function(object, function).is_some()
    }

    pub fn has_property(&self, object: &str, property: &str) -> bool {
        self.get_property(object, property).is_some()
    }

    pub fn get_function(&self, object: &str, function: &str) -> Option<&FunctionInfo> {
        self.functions
            .get(object.to_lowercase().as_str())?
            .get(function.to_lowercase().as_str())
    }

    pub fn get_property(&self, object: &str, property: &str) -> Option<PropertyInfo> {
        self.properties
            .get(object.to_lowercase().as_str())?
            .get(property.to_lowercase().as_str())
            .copied()
    }

    /// Validate a call against the table: the (object, method) pair must
    /// exist, the argument count must match exactly, and every argument kind
    /// must equal the declared parameter kind unless that kind is `Any`.
    pub fn validate_function_call(&self, object: &str, function: &str, args: &[ParamType]) -> bool {
        let Some(info) = self.get_function(object, function) else {
            return false;
        };

        if args.len() != info.params.len() {
            return false;
        }

        args.iter()
            .zip(&info.params)
            .all(|(arg, expected)| *expected == ParamType::Any || arg == expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookups_are_case_insensitive() {
        let registry = Registry::new();
        assert!(registry.has_object("TextWindow"));
        assert!(registry.has_object("TEXTWINDOW"));
        assert!(registry.has_function("TextWindow", "WriteLine"));
        assert!(registry.has_function("textwindow", "writeline"));
        assert!(registry.has_property("Clock", "Date"));
        assert!(!registry.has_object("Turtle"));
    }

    #[test]
    fn test_object_known_through_properties_only() {
        let registry = Registry::new();
        // Clock has no methods, only a property; it is still an object
        assert!(registry.has_object("Clock"));
        assert!(!registry.has_function("Clock", "Date"));
    }

    #[test]
    fn test_get_function_signature() {
        let registry = Registry::new();
        let info = registry.get_function("Math", "Abs").unwrap();
        assert_eq!(info.params, vec![ParamType::Number]);
        assert_eq!(info.return_type, ReturnType::Number);
    }

    #[test]
    fn test_read_only_flag() {
        let registry = Registry::new();
        assert!(registry.get_property("Clock", "Date").unwrap().read_only);
        assert!(!registry.get_property("TextWindow", "Title").unwrap().read_only);
    }

    #[test]
    fn test_validate_function_call_arity() {
        let registry = Registry::new();
        assert!(registry.validate_function_call("TextWindow", "WriteLine", &[ParamType::String]));
        assert!(!registry.validate_function_call("TextWindow", "WriteLine", &[]));
        assert!(!registry.validate_function_call(
            "TextWindow",
            "WriteLine",
            &[ParamType::String, ParamType::String]
        ));
    }

    #[test]
    fn test_validate_function_call_kinds() {
        let registry = Registry::new();
        // Math.Abs wants a Number
        assert!(registry.validate_function_call("Math", "Abs", &[ParamType::Number]));
        assert!(!registry.validate_function_call("Math", "Abs", &[ParamType::String]));
        // Any accepts everything
        assert!(registry.validate_function_call("TextWindow", "Write", &[ParamType::Number]));
        assert!(registry.validate_function_call("TextWindow", "Write", &[ParamType::Any]));
    }

    #[test]
    fn test_validate_unknown_pair() {
        let registry = Registry::new();
        assert!(!registry.validate_function_call("TextWindow", "Explode", &[]));
        assert!(!registry.validate_function_call("Nothing", "WriteLine", &[]));
    }
}
