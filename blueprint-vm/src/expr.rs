//! Parameter expressions.
//!
//! Expressions are compiled with Rhai's expression-only mode on a raw engine
//! (no packages): literals, arithmetic, comparisons, logic, name lookups and
//! property reads on the owner. Statements, assignments, loops and function
//! definitions are rejected at parse time.
//!
//! Name resolution order: local scope, then graph variables, then `owner`,
//! which is a read-only map of the bound object's exposed fields.
//!
//! A raw engine only concatenates strings with strings, so `+` is registered
//! between a string and an int, float or bool (either side).

use crate::{
    config::RuntimeConfig, error::ExprError, object::ScriptObject, scope::LocalScope,
    scope::Variables, value::Value,
};
use rhai::{Array, Dynamic, Engine, ImmutableString, Map, Scope, AST, FLOAT, INT};

/// Name under which the bound object's fields are visible.
pub const OWNER_NAME: &str = "owner";

#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    ast: AST,
}

impl Expression {
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// What an expression may read while it is evaluated.
pub struct ExprEnv<'a> {
    pub scope: &'a LocalScope,
    pub variables: &'a Variables,
    pub owner: Option<&'a dyn ScriptObject>,
}

pub struct ExpressionEngine {
    engine: Engine,
}

impl Default for ExpressionEngine {
    fn default() -> Self {
        Self::new(&RuntimeConfig::default())
    }
}

impl ExpressionEngine {
    pub fn new(config: &RuntimeConfig) -> Self {
        let mut engine = Engine::new_raw();
        engine.set_max_operations(config.max_expr_operations);
        engine.set_max_expr_depths(config.max_expr_depth, config.max_expr_depth);
        register_concat(&mut engine);
        Self { engine }
    }

    pub fn parse(&self, source: &str) -> Result<Expression, ExprError> {
        let ast = self
            .engine
            .compile_expression(source)
            .map_err(|err| ExprError::Parse(err.to_string()))?;
        Ok(Expression {
            source: source.to_string(),
            ast,
        })
    }

    /// Evaluates `expr` against a snapshot of `env` taken now. Nothing is cached
    /// between calls.
    pub fn evaluate(&self, expr: &Expression, env: &ExprEnv<'_>) -> Result<Value, ExprError> {
        let mut scope = Scope::new();

        if let Some(owner) = env.owner {
            let mut fields = Map::new();
            for (name, value) in owner.fields() {
                fields.insert(name.into(), value_to_dynamic(&value));
            }
            scope.push_constant_dynamic(OWNER_NAME, Dynamic::from_map(fields));
        }
        // Pushed later means found first.
        for (name, value) in env.variables.iter() {
            scope.push_dynamic(name.as_str(), value_to_dynamic(value));
        }
        for (name, value) in env.scope.iter() {
            scope.push_dynamic(name, value_to_dynamic(value));
        }

        let result = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &expr.ast)
            .map_err(|err| ExprError::Eval(err.to_string()))?;

        dynamic_to_value(&result)
            .ok_or_else(|| ExprError::Unsupported(result.type_name().to_string()))
    }
}

fn register_concat(engine: &mut Engine) {
    engine
        .register_fn("+", |a: ImmutableString, b: INT| format!("{a}{b}"))
        .register_fn("+", |a: INT, b: ImmutableString| format!("{a}{b}"))
        .register_fn("+", |a: ImmutableString, b: FLOAT| format!("{a}{b}"))
        .register_fn("+", |a: FLOAT, b: ImmutableString| format!("{a}{b}"))
        .register_fn("+", |a: ImmutableString, b: bool| format!("{a}{b}"))
        .register_fn("+", |a: bool, b: ImmutableString| format!("{a}{b}"));
}

fn value_to_dynamic(v: &Value) -> Dynamic {
    match v {
        Value::Unit => Dynamic::UNIT,
        Value::Bool(b) => (*b).into(),
        Value::Int(i) => Dynamic::from(*i),
        Value::Float(f) => Dynamic::from(*f),
        Value::String(s) => s.clone().into(),
        Value::List(items) => Dynamic::from_array(items.iter().map(value_to_dynamic).collect()),
    }
}

fn dynamic_to_value(v: &Dynamic) -> Option<Value> {
    if v.is_unit() {
        return Some(Value::Unit);
    }
    if v.is::<bool>() {
        return Some(Value::Bool(v.clone_cast::<bool>()));
    }
    if v.is::<INT>() {
        return Some(Value::Int(v.clone_cast::<INT>()));
    }
    if v.is::<FLOAT>() {
        return Some(Value::Float(v.clone_cast::<FLOAT>()));
    }
    if v.is::<String>() {
        return Some(Value::String(v.clone_cast::<String>()));
    }
    if v.is::<Array>() {
        return v
            .clone_cast::<Array>()
            .iter()
            .map(dynamic_to_value)
            .collect::<Option<Vec<_>>>()
            .map(Value::List);
    }

    None
}
