//! Named function registry.
//!
//! Derived attributes, filters and reducers are referenced by name (plus
//! literal parameters) so table specifications stay plain data. The registry
//! resolves a name to a callable at run time and ships with a small set of
//! defaults.

use crate::item::ItemRef;
use futures::future::{self, LocalBoxFuture};
use futures::FutureExt;
use reshape_core::{Error, OrderedMap, Result, Value};
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

/// Computes a derived attribute; may suspend.
pub type DeriveFn = Rc<dyn Fn(ItemRef, Rc<[Value]>) -> LocalBoxFuture<'static, Result<Value>>>;

/// Tests an attribute value (or an item index).
pub type FilterFn = Rc<dyn Fn(&Value, &[Value]) -> bool>;

/// Folds a newly contributing item into an aggregate's current value.
pub type ReduceFn = Rc<dyn Fn(&Value, &ItemRef, &[Value]) -> Result<Value>>;

/// Registry of named derive, filter and reduce functions.
pub struct FunctionRegistry {
    derive: RefCell<OrderedMap<String, DeriveFn>>,
    filter: RefCell<OrderedMap<String, FilterFn>>,
    reduce: RefCell<OrderedMap<String, ReduceFn>>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    /// Creates a registry holding the default functions.
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.install_defaults();
        registry
    }

    /// Creates a registry with no functions.
    pub fn empty() -> Self {
        Self {
            derive: RefCell::new(OrderedMap::default()),
            filter: RefCell::new(OrderedMap::default()),
            reduce: RefCell::new(OrderedMap::default()),
        }
    }

    /// Registers an asynchronous derive function, replacing any of the same name.
    pub fn register_derive<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(ItemRef, Rc<[Value]>) -> Fut + 'static,
        Fut: Future<Output = Result<Value>> + 'static,
    {
        let f: DeriveFn =
            Rc::new(move |item: ItemRef, params: Rc<[Value]>| f(item, params).boxed_local());
        self.derive.borrow_mut().insert(name.into(), f);
    }

    /// Registers a synchronous derive function.
    pub fn register_derive_sync<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(&ItemRef, &[Value]) -> Result<Value> + 'static,
    {
        let f: DeriveFn = Rc::new(move |item: ItemRef, params: Rc<[Value]>| {
            future::ready(f(&item, &params)).boxed_local()
        });
        self.derive.borrow_mut().insert(name.into(), f);
    }

    /// Registers a filter predicate.
    pub fn register_filter<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(&Value, &[Value]) -> bool + 'static,
    {
        self.filter.borrow_mut().insert(name.into(), Rc::new(f));
    }

    /// Registers a reducer.
    pub fn register_reduce<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(&Value, &ItemRef, &[Value]) -> Result<Value> + 'static,
    {
        self.reduce.borrow_mut().insert(name.into(), Rc::new(f));
    }

    /// Resolves a derive function.
    pub fn derive(&self, name: &str) -> Result<DeriveFn> {
        self.derive
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::unknown_function("derive", name))
    }

    /// Resolves a filter function.
    pub fn filter(&self, name: &str) -> Result<FilterFn> {
        self.filter
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::unknown_function("filter", name))
    }

    /// Resolves a reduce function.
    pub fn reduce(&self, name: &str) -> Result<ReduceFn> {
        self.reduce
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::unknown_function("reduce", name))
    }

    /// Names of the registered derive functions.
    pub fn derive_names(&self) -> Vec<String> {
        self.derive.borrow().keys().cloned().collect()
    }

    /// Names of the registered filter functions.
    pub fn filter_names(&self) -> Vec<String> {
        self.filter.borrow().keys().cloned().collect()
    }

    /// Names of the registered reduce functions.
    pub fn reduce_names(&self) -> Vec<String> {
        self.reduce.borrow().keys().cloned().collect()
    }

    fn install_defaults(&self) {
        self.register_derive_sync("identity", |item, params| {
            Ok(item.get(&attribute_param("identity", params, 0)?))
        });
        self.register_derive_sync("constant", |_, params| {
            Ok(params.first().cloned().unwrap_or(Value::Null))
        });
        // params: [table id, attribute]
        self.register_derive_sync("copy", |item, params| {
            let table_id = params
                .first()
                .and_then(Value::as_i64)
                .ok_or_else(|| Error::function("copy", "expected a table id parameter"))?;
            let attribute = attribute_param("copy", params, 1)?;
            Ok(item
                .first_connected(table_id as u64)
                .map(|other| other.get(&attribute))
                .unwrap_or(Value::Null))
        });
        // params: [separator, attribute...]
        self.register_derive_sync("concat", |item, params| {
            let separator = params.first().map(Value::to_key_string).unwrap_or_default();
            let parts: Vec<String> = params
                .iter()
                .skip(1)
                .map(|a| item.get(&a.to_key_string()).to_key_string())
                .collect();
            Ok(Value::String(parts.join(&separator)))
        });
        self.register_derive_sync("index", |item, _| Ok(item.index().to_value()));
        self.register_derive_sync("connection_count", |item, params| {
            let table_id = params.first().and_then(Value::as_i64).map(|id| id as u64);
            Ok(Value::from(item.connection_count(table_id)))
        });

        self.register_filter("equals", |value, params| {
            params
                .first()
                .map(|p| p.to_key_string() == value.to_key_string())
                .unwrap_or(false)
        });
        self.register_filter("not_equals", |value, params| {
            params
                .first()
                .map(|p| p.to_key_string() != value.to_key_string())
                .unwrap_or(true)
        });
        self.register_filter("non_empty", |value, _| match value {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            _ => true,
        });
        self.register_filter("contains", |value, params| {
            let Some(needle) = params.first() else { return false };
            match value {
                Value::String(s) => s.contains(needle.to_key_string().as_str()),
                Value::List(items) => items.iter().any(|v| v == needle),
                _ => false,
            }
        });
        self.register_filter("always", |_, _| true);

        self.register_reduce("count", |current, _, _| {
            let count = current.as_i64().unwrap_or(0);
            Ok(count
                .checked_add(1)
                .map(Value::Int64)
                .unwrap_or(Value::Float64(count as f64 + 1.0)))
        });
        self.register_reduce("sum", |current, incoming, params| {
            let attribute = attribute_param("sum", params, 0)?;
            let added = incoming.get(&attribute);
            Ok(match (current, &added) {
                (Value::Null, Value::Int64(b)) => Value::Int64(*b),
                (Value::Int64(a), Value::Int64(b)) => a
                    .checked_add(*b)
                    .map(Value::Int64)
                    .unwrap_or(Value::Float64(*a as f64 + *b as f64)),
                _ => Value::Float64(current.as_f64().unwrap_or(0.0) + added.as_f64().unwrap_or(0.0)),
            })
        });
        self.register_reduce("first", |current, incoming, params| {
            if current.is_null() {
                Ok(incoming.get(&attribute_param("first", params, 0)?))
            } else {
                Ok(current.clone())
            }
        });
        self.register_reduce("last", |_, incoming, params| {
            Ok(incoming.get(&attribute_param("last", params, 0)?))
        });
        self.register_reduce("collect", |current, incoming, params| {
            let mut values = current.as_list().map(<[Value]>::to_vec).unwrap_or_default();
            values.push(incoming.get(&attribute_param("collect", params, 0)?));
            Ok(Value::List(values))
        });
        self.register_reduce("noop", |current, _, _| Ok(current.clone()));
    }
}

fn attribute_param(function: &str, params: &[Value], position: usize) -> Result<String> {
    params
        .get(position)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::function(function, "expected an attribute name parameter"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Item;
    use futures::executor::block_on;
    use reshape_core::{ItemIndex, Row};
    use std::rc::Weak;

    fn item(row: Row) -> ItemRef {
        Item::detached(ItemIndex::from("k"), 1, Weak::new(), row)
    }

    #[test]
    fn test_unknown_function() {
        let registry = FunctionRegistry::new();
        assert!(matches!(
            registry.derive("nope"),
            Err(Error::UnknownFunction { kind: "derive", .. })
        ));
        assert!(registry.filter("nope").is_err());
        assert!(registry.reduce("nope").is_err());
    }

    #[test]
    fn test_default_derives() {
        let registry = FunctionRegistry::new();
        let it = item([("a", "x"), ("b", "y")].into_iter().collect());

        let concat = registry.derive("concat").unwrap();
        let params: Rc<[Value]> = vec![Value::from("-"), Value::from("a"), Value::from("b")].into();
        assert_eq!(block_on(concat(it.clone(), params)).unwrap(), Value::from("x-y"));

        let index = registry.derive("index").unwrap();
        assert_eq!(block_on(index(it.clone(), Rc::from(vec![]))).unwrap(), Value::from("k"));

        let identity = registry.derive("identity").unwrap();
        assert!(block_on(identity(it, Rc::from(vec![]))).is_err());
    }

    #[test]
    fn test_default_filters() {
        let registry = FunctionRegistry::new();
        let equals = registry.filter("equals").unwrap();
        assert!(equals(&Value::Int64(1), &[Value::from("1")]));
        assert!(!equals(&Value::Int64(2), &[Value::from("1")]));

        let non_empty = registry.filter("non_empty").unwrap();
        assert!(!non_empty(&Value::from(""), &[]));
        assert!(non_empty(&Value::from("a"), &[]));

        let contains = registry.filter("contains").unwrap();
        assert!(contains(&Value::from("abc"), &[Value::from("b")]));
    }

    #[test]
    fn test_default_reducers() {
        let registry = FunctionRegistry::new();
        let it = item(Row::with("n", 4));

        let count = registry.reduce("count").unwrap();
        let once = count(&Value::Null, &it, &[]).unwrap();
        assert_eq!(count(&once, &it, &[]).unwrap(), Value::Int64(2));

        let sum = registry.reduce("sum").unwrap();
        let params = [Value::from("n")];
        let total = sum(&Value::Null, &it, &params).unwrap();
        assert_eq!(sum(&total, &it, &params).unwrap(), Value::Int64(8));

        let collect = registry.reduce("collect").unwrap();
        let list = collect(&Value::Null, &it, &params).unwrap();
        assert_eq!(list, Value::List(vec![Value::Int64(4)]));
    }

    #[test]
    fn test_reducers_widen_on_overflow() {
        let registry = FunctionRegistry::new();
        let params = [Value::from("n")];

        let sum = registry.reduce("sum").unwrap();
        let big = sum(&Value::Null, &item(Row::with("n", i64::MAX)), &params).unwrap();
        assert_eq!(big, Value::Int64(i64::MAX));
        let total = sum(&big, &item(Row::with("n", 1i64)), &params).unwrap();
        assert_eq!(total, Value::Float64(i64::MAX as f64 + 1.0));

        let count = registry.reduce("count").unwrap();
        let counted = count(&Value::Int64(i64::MAX), &item(Row::new()), &[]).unwrap();
        assert!(matches!(counted, Value::Float64(_)));
    }

    #[test]
    fn test_register_replaces() {
        let registry = FunctionRegistry::empty();
        registry.register_filter("f", |_, _| false);
        registry.register_filter("f", |_, _| true);
        assert!(registry.filter("f").unwrap()(&Value::Null, &[]));
        assert_eq!(registry.filter_names(), vec!["f".to_string()]);
    }
}
