//! Integration tests for the runtime context tree.

use emberscript::{
    Access, ContextKind, FunctionRuntimeContext, FunctionSignature, GlobalRuntimeContext, Parameter,
    RuntimeContext, RuntimeError, Script, ScopeRuntimeContext, ScriptRuntimeContext, Value, ValueType,
};

fn empty_context(global: &GlobalRuntimeContext) -> ScriptRuntimeContext {
    Script::compile("void Noop() { }")
        .unwrap()
        .prepare(global)
        .unwrap()
}

fn call_context(script: &ScriptRuntimeContext, parameters: Vec<Parameter>, arguments: Vec<Value>) -> FunctionRuntimeContext {
    let signature = FunctionSignature::new("Call", ValueType::Void, parameters);
    FunctionRuntimeContext::new(script.clone(), &signature, arguments).unwrap()
}

#[test]
fn test_global_declare_twice_fails() {
    let mut global = GlobalRuntimeContext::new();
    global.declare_variable("x", ValueType::Int, Value::Int(1)).unwrap();

    let err = global
        .declare_variable("x", ValueType::Int, Value::Int(2))
        .unwrap_err();
    assert_eq!(err, RuntimeError::AlreadyDeclared { key: "x".to_string() });
    assert_eq!(global.raw_value("x"), Some(Value::Int(1)));
}

#[test]
fn test_script_sees_only_declared_globals() {
    let global = GlobalRuntimeContext::new();
    global.add_or_set_value("hp", ValueType::Int, Value::Int(10)).unwrap();

    let first = empty_context(&global);
    let second = empty_context(&global);
    assert_eq!(first.kind(), ContextKind::Script);
    assert!(first.global_variable_exists("hp"));
    assert!(!first.variable_exists("hp"));

    first.declare_existing_global("hp", ValueType::Int).unwrap();
    assert!(first.variable_exists("hp"));
    assert!(first.has_global_declaration("hp"));
    assert_eq!(first.get_existing_value("hp", ValueType::Int).unwrap(), Value::Int(10));

    assert!(!second.variable_exists("hp"));
    assert_eq!(
        second.get_existing_value("hp", ValueType::Int).unwrap_err(),
        RuntimeError::NeverDeclared {
            key: "hp".to_string(),
            access: Access::Requested,
        }
    );
}

#[test]
fn test_declare_existing_global_errors() {
    let global = GlobalRuntimeContext::new();
    global.add_or_set_value("speed", ValueType::Float, Value::Float(1.0)).unwrap();
    let context = empty_context(&global);

    assert_eq!(
        context.declare_existing_global("missing", ValueType::Int).unwrap_err(),
        RuntimeError::UnknownGlobal("missing".to_string())
    );
    assert_eq!(
        context.declare_existing_global("speed", ValueType::Double).unwrap_err(),
        RuntimeError::GlobalTypeMismatch {
            key: "speed".to_string(),
            declared: ValueType::Double,
            actual: ValueType::Float,
        }
    );
    assert!(!context.has_global_declaration("speed"));
}

#[test]
fn test_declare_new_global_is_shared() {
    let global = GlobalRuntimeContext::new();
    let first = empty_context(&global);
    let second = empty_context(&global);

    first
        .declare_new_global("score", ValueType::Long, Value::Int(5))
        .unwrap();
    assert_eq!(global.raw_value("score"), Some(Value::Long(5)));
    assert!(first.variable_exists("score"));

    let err = second
        .declare_new_global("score", ValueType::Long, Value::Long(1))
        .unwrap_err();
    assert_eq!(err, RuntimeError::AlreadyDeclared { key: "score".to_string() });

    second.declare_existing_global("score", ValueType::Long).unwrap();
    let mut writer = second.clone();
    writer.set_existing_value("score", Value::Long(9)).unwrap();
    assert_eq!(first.get_existing_value("score", ValueType::Long).unwrap(), Value::Long(9));
}

#[test]
fn test_scope_requires_function_or_scope_parent() {
    let mut global = GlobalRuntimeContext::new();
    let mut script = empty_context(&global);

    assert_eq!(
        ScopeRuntimeContext::new(&mut script).unwrap_err(),
        RuntimeError::InvalidScopeParent("script context".to_string())
    );
    assert_eq!(
        ScopeRuntimeContext::new(&mut global).unwrap_err(),
        RuntimeError::InvalidScopeParent("global context".to_string())
    );

    let mut function = call_context(&script, vec![], vec![]);
    let mut outer = ScopeRuntimeContext::new(&mut function).unwrap();
    let inner = ScopeRuntimeContext::new(&mut outer).unwrap();
    assert_eq!(inner.kind(), ContextKind::Scope);
}

#[test]
fn test_function_binds_and_converts_arguments() {
    let global = GlobalRuntimeContext::new();
    let script = empty_context(&global);

    let function = call_context(
        &script,
        vec![
            Parameter::new("x", ValueType::Double),
            Parameter::new("name", ValueType::String),
        ],
        vec![Value::Int(3), Value::from("ada")],
    );

    assert_eq!(function.kind(), ContextKind::Function);
    assert_eq!(function.signature().identifier(), "Call");
    assert_eq!(function.get_existing_value("x", ValueType::Double).unwrap(), Value::Double(3.0));
    assert_eq!(function.lookup("x").unwrap().value_type(), ValueType::Double);
    assert_eq!(function.get_existing_value("name", ValueType::String).unwrap(), Value::from("ada"));
    assert!(function.script().is_ok());
    assert!(function.function().is_ok());
}

#[test]
fn test_function_rejects_bad_arguments() {
    let global = GlobalRuntimeContext::new();
    let script = empty_context(&global);
    let signature = FunctionSignature::new("Call", ValueType::Void, vec![Parameter::new("n", ValueType::Int)]);

    let err = FunctionRuntimeContext::new(script.clone(), &signature, vec![Value::Bool(true)]).unwrap_err();
    assert_eq!(
        err,
        RuntimeError::ArgumentType {
            parameter: "n".to_string(),
            expected: ValueType::Int,
            received: ValueType::Bool,
        }
    );

    let err = FunctionRuntimeContext::new(script, &signature, vec![]).unwrap_err();
    assert!(matches!(err, RuntimeError::ArgumentCount { .. }));
}

#[test]
fn test_get_existing_value_converts_or_rejects() {
    let global = GlobalRuntimeContext::new();
    let script = empty_context(&global);
    let function = call_context(&script, vec![Parameter::new("n", ValueType::Int)], vec![Value::Int(7)]);

    assert_eq!(function.get_existing_value("n", ValueType::Long).unwrap(), Value::Long(7));
    assert_eq!(function.get_existing_value("n", ValueType::Float).unwrap(), Value::Float(7.0));
    assert_eq!(
        function.get_existing_value("n", ValueType::String).unwrap_err(),
        RuntimeError::TypeMismatch {
            key: "n".to_string(),
            requested: ValueType::String,
            stored: ValueType::Int,
        }
    );
}

#[test]
fn test_set_existing_value_rules() {
    let global = GlobalRuntimeContext::new();
    let script = empty_context(&global);
    let mut function = call_context(&script, vec![Parameter::new("n", ValueType::Int)], vec![Value::Int(1)]);

    function.set_existing_value("n", Value::Double(4.0)).unwrap();
    assert_eq!(function.lookup("n").unwrap().into_value(), Value::Int(4));

    assert_eq!(
        function.set_existing_value("n", Value::from("four")).unwrap_err(),
        RuntimeError::TypeMismatch {
            key: "n".to_string(),
            requested: ValueType::String,
            stored: ValueType::Int,
        }
    );
    assert_eq!(
        function.set_existing_value("missing", Value::Int(1)).unwrap_err(),
        RuntimeError::NeverDeclared {
            key: "missing".to_string(),
            access: Access::Set,
        }
    );
}

#[test]
fn test_scope_shadows_and_restores() {
    let global = GlobalRuntimeContext::new();
    let script = empty_context(&global);
    let mut function = call_context(&script, vec![Parameter::new("n", ValueType::Int)], vec![Value::Int(1)]);

    {
        let mut scope = ScopeRuntimeContext::new(&mut function).unwrap();
        scope
            .declare_variable("n", ValueType::String, Value::from("inner"))
            .unwrap();
        assert_eq!(scope.get_existing_value("n", ValueType::String).unwrap(), Value::from("inner"));

        let err = scope
            .declare_variable("n", ValueType::Int, Value::Int(2))
            .unwrap_err();
        assert_eq!(err, RuntimeError::AlreadyDeclared { key: "n".to_string() });
    }

    assert_eq!(function.get_existing_value("n", ValueType::Int).unwrap(), Value::Int(1));
}

#[test]
fn test_sibling_scopes_declare_same_name() {
    let global = GlobalRuntimeContext::new();
    let script = empty_context(&global);
    let mut function = call_context(&script, vec![], vec![]);

    {
        let mut first = ScopeRuntimeContext::new(&mut function).unwrap();
        first.declare_variable("i", ValueType::Int, Value::Int(1)).unwrap();
    }
    {
        let mut second = ScopeRuntimeContext::new(&mut function).unwrap();
        second
            .declare_variable("i", ValueType::String, Value::from("a"))
            .unwrap();
        assert_eq!(second.lookup("i").unwrap().value_type(), ValueType::String);
    }
    assert!(!function.variable_exists("i"));
}

#[test]
fn test_scope_writes_reach_ancestors() {
    let global = GlobalRuntimeContext::new();
    let script = empty_context(&global);
    script
        .declare_new_global("total", ValueType::Int, Value::Int(0))
        .unwrap();
    let mut function = call_context(&script, vec![Parameter::new("n", ValueType::Int)], vec![Value::Int(1)]);

    {
        let mut outer = ScopeRuntimeContext::new(&mut function).unwrap();
        let mut inner = ScopeRuntimeContext::new(&mut outer).unwrap();
        inner.set_existing_value("n", Value::Int(2)).unwrap();
        inner.set_existing_value("total", Value::Int(10)).unwrap();

        assert!(inner.function().is_ok());
        assert!(inner.script().is_ok());
        assert!(inner.global().same_as(&global));
    }

    assert_eq!(function.get_existing_value("n", ValueType::Int).unwrap(), Value::Int(2));
    assert_eq!(global.raw_value("total"), Some(Value::Int(10)));
}

#[test]
fn test_script_members_visible_to_functions() {
    let global = GlobalRuntimeContext::new();
    let script = empty_context(&global);
    let mut members = script.clone();
    members
        .declare_variable("count", ValueType::Int, Value::Int(3))
        .unwrap();

    let function = call_context(&script, vec![], vec![]);
    assert_eq!(function.get_existing_value("count", ValueType::Int).unwrap(), Value::Int(3));
    assert_eq!(global.raw_value("count"), None);
    assert!(script.function().is_err());
}
