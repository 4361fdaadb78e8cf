//! Property-based tests for values and contexts.

use emberscript::{
    Compatibility, FunctionRuntimeContext, FunctionSignature, GlobalRuntimeContext, RuntimeContext, RuntimeError,
    Script, ScopeRuntimeContext, Value, ValueType,
};
use proptest::prelude::*;

fn numeric_type() -> impl Strategy<Value = ValueType> {
    prop::sample::select(vec![ValueType::Int, ValueType::Long, ValueType::Float, ValueType::Double])
}

proptest! {
    #[test]
    fn prop_script_addition_wraps(a in any::<i32>(), b in any::<i32>()) {
        let script = Script::compile("int Add(int a, int b) { return a + b; }").unwrap();
        let context = script.prepare(&GlobalRuntimeContext::new()).unwrap();

        let sum: i32 = script
            .execute_function_as("Add", &context, vec![Value::Int(a), Value::Int(b)])
            .unwrap();
        prop_assert_eq!(sum, a.wrapping_add(b));
    }

    #[test]
    fn prop_numeric_types_are_compatible(target in numeric_type(), source in numeric_type()) {
        let expected = if target == source {
            Compatibility::Assignable
        } else {
            Compatibility::Convertible
        };
        prop_assert_eq!(target.compatibility_from(source), expected);
        prop_assert!(!ValueType::Bool.accepts(source));
        prop_assert!(!ValueType::String.accepts(source));
    }

    #[test]
    fn prop_declare_twice_fails(key in "[a-z][a-z0-9_]{0,8}", n in any::<i32>()) {
        let mut global = GlobalRuntimeContext::new();
        global.declare_variable(&key, ValueType::Int, Value::Int(n)).unwrap();

        let err = global.declare_variable(&key, ValueType::Int, Value::Int(n)).unwrap_err();
        prop_assert_eq!(err, RuntimeError::AlreadyDeclared { key: key.clone() });
        prop_assert_eq!(global.raw_value(&key), Some(Value::Int(n)));
    }

    #[test]
    fn prop_scope_shadowing_restores(key in "[a-z][a-z0-9_]{0,8}", outer in any::<i64>(), inner in ".{0,12}") {
        let script = Script::compile("void Noop() { }").unwrap();
        let context = script.prepare(&GlobalRuntimeContext::new()).unwrap();
        let signature = FunctionSignature::new("Noop", ValueType::Void, vec![]);
        let mut function = FunctionRuntimeContext::new(context, &signature, vec![]).unwrap();
        function.declare_variable(&key, ValueType::Long, Value::Long(outer)).unwrap();

        {
            let mut scope = ScopeRuntimeContext::new(&mut function).unwrap();
            scope.declare_variable(&key, ValueType::String, Value::from(inner.clone())).unwrap();
            prop_assert_eq!(
                scope.get_existing_value(&key, ValueType::String).unwrap(),
                Value::String(inner)
            );
        }

        prop_assert_eq!(
            function.get_existing_value(&key, ValueType::Long).unwrap(),
            Value::Long(outer)
        );
    }

    #[test]
    fn prop_return_stash_round_trip(n in any::<i64>(), m in any::<i32>()) {
        let global = GlobalRuntimeContext::new();

        global.push_return_value(Value::Long(n));
        prop_assert_eq!(global.pop_return_value(ValueType::Long).unwrap(), Value::Long(n));
        prop_assert_eq!(global.take_return_value(), None);

        global.push_return_value(Value::Int(m));
        prop_assert_eq!(global.pop_return_value(ValueType::Long).unwrap(), Value::Long(i64::from(m)));
    }
}
