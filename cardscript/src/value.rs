// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The runtime value of the language.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use cardscript_dirty::{Dependency, DependencySink};

use crate::color::Color;
use crate::error::{ScriptError, ScriptResult};
use crate::function::Function;
use crate::object::{Collection, CollectionIterator, ScriptIterator, ScriptObject};

/// The tag of a [`ScriptValue`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScriptType {
    /// [`ScriptValue::Nil`].
    Nil,
    /// [`ScriptValue::Bool`].
    Bool,
    /// [`ScriptValue::Int`].
    Int,
    /// [`ScriptValue::Double`].
    Double,
    /// [`ScriptValue::String`].
    String,
    /// [`ScriptValue::Color`].
    Color,
    /// [`ScriptValue::Image`].
    Image,
    /// [`ScriptValue::Function`].
    Function,
    /// [`ScriptValue::Object`].
    Object,
    /// [`ScriptValue::Collection`].
    Collection,
    /// [`ScriptValue::Iterator`].
    Iterator,
    /// [`ScriptValue::Error`].
    Error,
    /// [`ScriptValue::Abstract`], only seen during dependency analysis.
    Abstract,
}

/// Placeholders produced by dependency analysis.
#[derive(Debug)]
pub enum AbstractValue {
    /// Stands for any value; swallows every operation.
    Dummy,
    /// A variable that was not bound when the script was analysed. Behaves
    /// like nil.
    MissingVariable(Rc<str>),
    /// Either of two values, from two control-flow paths that joined.
    Union(ScriptValue, ScriptValue),
}

/// A value as scripts see it.
///
/// Values are immutable and cheap to clone: every payload larger than a word
/// is reference counted.
#[derive(Clone, Debug, Default)]
pub enum ScriptValue {
    /// The absence of a value.
    #[default]
    Nil,
    /// `true` or `false`.
    Bool(bool),
    /// A whole number.
    Int(i64),
    /// A floating-point number.
    Double(f64),
    /// Text.
    String(Rc<str>),
    /// An RGBA color.
    Color(Color),
    /// A reference to an image, by name.
    Image(Rc<str>),
    /// Something that can be called.
    Function(Rc<Function>),
    /// A host object.
    Object(Rc<dyn ScriptObject>),
    /// A list, possibly keyed.
    Collection(Rc<Collection>),
    /// A one-shot iterator.
    Iterator(Rc<RefCell<dyn ScriptIterator>>),
    /// A delayed error: raised again as soon as the value is used.
    Error(Rc<ScriptError>),
    /// A placeholder from dependency analysis.
    Abstract(Rc<AbstractValue>),
}

impl ScriptValue {
    /// The dependency-analysis placeholder for "any value".
    #[must_use]
    pub fn dummy() -> Self {
        Self::Abstract(Rc::new(AbstractValue::Dummy))
    }

    /// A named stand-in for an unbound variable during analysis.
    #[must_use]
    pub fn missing_variable(name: &str) -> Self {
        Self::Abstract(Rc::new(AbstractValue::MissingVariable(name.into())))
    }

    /// Wraps `error` as a delayed error value.
    #[must_use]
    pub fn error(error: ScriptError) -> Self {
        Self::Error(Rc::new(error))
    }

    /// Wraps a host object.
    #[must_use]
    pub fn object(object: impl ScriptObject + 'static) -> Self {
        Self::Object(Rc::new(object))
    }

    /// Wraps an iterator.
    #[must_use]
    pub fn iterator(iter: impl ScriptIterator + 'static) -> Self {
        Self::Iterator(Rc::new(RefCell::new(iter)))
    }

    /// Returns the tag of this value.
    #[must_use]
    pub fn script_type(&self) -> ScriptType {
        match self {
            Self::Nil => ScriptType::Nil,
            Self::Bool(_) => ScriptType::Bool,
            Self::Int(_) => ScriptType::Int,
            Self::Double(_) => ScriptType::Double,
            Self::String(_) => ScriptType::String,
            Self::Color(_) => ScriptType::Color,
            Self::Image(_) => ScriptType::Image,
            Self::Function(_) => ScriptType::Function,
            Self::Object(_) => ScriptType::Object,
            Self::Collection(_) => ScriptType::Collection,
            Self::Iterator(_) => ScriptType::Iterator,
            Self::Error(_) => ScriptType::Error,
            Self::Abstract(_) => ScriptType::Abstract,
        }
    }

    /// Returns a human readable type name, used in error messages.
    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            Self::Nil => "nil".into(),
            Self::Bool(_) => "boolean".into(),
            Self::Int(_) => "integer".into(),
            Self::Double(_) => "double".into(),
            Self::String(_) => "string".into(),
            Self::Color(_) => "color".into(),
            Self::Image(_) => "image".into(),
            Self::Function(f) => f.type_name(),
            Self::Object(o) => o.type_name().into(),
            Self::Collection(_) => "collection".into(),
            Self::Iterator(_) => "iterator".into(),
            Self::Error(_) => "error".into(),
            Self::Abstract(a) => match &**a {
                AbstractValue::Dummy => "dummy".into(),
                AbstractValue::MissingVariable(name) => format!("missing variable '{name}'"),
                AbstractValue::Union(a, b) => {
                    format!("union of {} and {}", a.type_name(), b.type_name())
                }
            },
        }
    }

    /// Returns `true` for nil and for unbound-variable placeholders.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        match self {
            Self::Nil => true,
            Self::Abstract(a) => matches!(**a, AbstractValue::MissingVariable(_)),
            _ => false,
        }
    }

    /// Returns `true` for placeholders produced by dependency analysis.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        matches!(self, Self::Abstract(_))
    }

    /// Returns the carried error of a delayed-error value.
    #[must_use]
    pub fn as_error(&self) -> Option<&ScriptError> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Raises the carried error of a delayed-error value, passes anything
    /// else through.
    pub fn check(self) -> ScriptResult<Self> {
        match self {
            Self::Error(e) => Err((*e).clone()),
            v => Ok(v),
        }
    }

    fn default_of(&self) -> Option<Self> {
        match self {
            Self::Object(o) => o.default_value(),
            _ => None,
        }
    }

    fn conversion_error(&self, to: &'static str) -> ScriptError {
        match self {
            Self::String(s) => ScriptError::conversion_of(s, to),
            v => ScriptError::conversion(v.type_name(), to),
        }
    }

    /// Converts to text.
    ///
    /// Every value has a text form. Only delayed errors fail.
    pub fn to_string_value(&self) -> ScriptResult<String> {
        Ok(match self {
            Self::Nil => String::new(),
            Self::Bool(b) => if *b { "true" } else { "false" }.into(),
            Self::Int(i) => i.to_string(),
            Self::Double(d) => d.to_string(),
            Self::String(s) | Self::Image(s) => s.to_string(),
            Self::Color(c) => c.to_string(),
            Self::Error(e) => return Err((**e).clone()),
            Self::Abstract(_) => String::new(),
            Self::Object(o) => match o.default_value() {
                Some(v) => return v.to_string_value(),
                None => format!("<{}>", o.type_name()),
            },
            Self::Collection(_) => return self.to_code(),
            Self::Function(_) | Self::Iterator(_) => format!("<{}>", self.type_name()),
        })
    }

    /// Converts to source-code form: strings quoted, collections as literals.
    pub fn to_code(&self) -> ScriptResult<String> {
        match self {
            Self::Nil => Ok("nil".into()),
            Self::String(s) => Ok(quote_string(s)),
            Self::Collection(c) => {
                let mut out = String::from("[");
                for (i, v) in c.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    if let Some(key) = c.key(i) {
                        out.push_str(key);
                        out.push_str(": ");
                    }
                    out.push_str(&v.to_code()?);
                }
                out.push(']');
                Ok(out)
            }
            Self::Object(o) => match o.default_value() {
                Some(v) => v.to_code(),
                None => Ok(format!("<{}>", o.type_name())),
            },
            v => v.to_string_value(),
        }
    }

    /// Converts to an integer. Doubles truncate toward zero.
    pub fn to_int(&self) -> ScriptResult<i64> {
        match self {
            Self::Nil | Self::Abstract(_) => Ok(0),
            Self::Bool(b) => Ok(i64::from(*b)),
            Self::Int(i) => Ok(*i),
            Self::Double(d) => Ok(double_to_int(*d)),
            Self::String(s) => parse_int(s).ok_or_else(|| self.conversion_error("integer")),
            Self::Error(e) => Err((**e).clone()),
            v => match v.default_of() {
                Some(d) => d.to_int(),
                None => Err(v.conversion_error("integer")),
            },
        }
    }

    /// Converts to a floating-point number.
    pub fn to_double(&self) -> ScriptResult<f64> {
        match self {
            Self::Nil | Self::Abstract(_) => Ok(0.0),
            Self::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Self::Int(i) => Ok(*i as f64),
            Self::Double(d) => Ok(*d),
            Self::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| self.conversion_error("double")),
            Self::Error(e) => Err((**e).clone()),
            v => match v.default_of() {
                Some(d) => d.to_double(),
                None => Err(v.conversion_error("double")),
            },
        }
    }

    /// Converts to a boolean.
    ///
    /// Strings `yes`/`true` are true, `no`/`false`/empty are false; any other
    /// text is a conversion error. Numbers are true when non-zero.
    pub fn to_bool(&self) -> ScriptResult<bool> {
        match self {
            Self::Nil | Self::Abstract(_) => Ok(false),
            Self::Bool(b) => Ok(*b),
            Self::Int(i) => Ok(*i != 0),
            Self::Double(d) => Ok(*d != 0.0),
            Self::String(s) => match &**s {
                "yes" | "true" => Ok(true),
                "no" | "false" | "" => Ok(false),
                _ => Err(self.conversion_error("boolean")),
            },
            Self::Error(e) => Err((**e).clone()),
            v => match v.default_of() {
                Some(d) => d.to_bool(),
                None => Err(v.conversion_error("boolean")),
            },
        }
    }

    /// Converts to a color.
    pub fn to_color(&self) -> ScriptResult<Color> {
        match self {
            Self::Nil | Self::Abstract(_) => Ok(Color::default()),
            Self::Color(c) => Ok(*c),
            Self::String(s) => Color::parse(s).ok_or_else(|| self.conversion_error("color")),
            Self::Error(e) => Err((**e).clone()),
            v => match v.default_of() {
                Some(d) => d.to_color(),
                None => Err(v.conversion_error("color")),
            },
        }
    }

    /// Looks up a member.
    ///
    /// Failures come back as delayed errors so that `or else` can catch them.
    #[must_use]
    pub fn get_member(&self, name: &str) -> Self {
        let result = match self {
            Self::Error(_) => return self.clone(),
            Self::Nil => return Self::Nil,
            Self::Abstract(_) => return Self::dummy(),
            Self::Collection(c) => c.member(name),
            Self::Object(o) => o.get_member(name).or_else(|e| match o.default_value() {
                Some(d) => d.get_member(name).check(),
                None => Err(e),
            }),
            Self::String(s) => string_member(s, name),
            v => Err(ScriptError::NoMember {
                type_name: v.type_name(),
                name: name.into(),
            }),
        };
        result.unwrap_or_else(Self::error)
    }

    /// The dependency-analysis counterpart of [`get_member`](Self::get_member).
    ///
    /// `name` is `None` when the member name is not known statically.
    #[must_use]
    pub fn dependency_member(
        &self,
        name: Option<&str>,
        dep: Dependency,
        sink: &mut dyn DependencySink,
    ) -> Self {
        match self {
            Self::Object(o) => o.dependency_member(name, dep, sink),
            Self::Abstract(a) => match &**a {
                AbstractValue::Union(x, y) => {
                    let x = x.dependency_member(name, dep, sink);
                    let y = y.dependency_member(name, dep, sink);
                    unified(&x, &y)
                }
                _ => Self::dummy(),
            },
            Self::Error(_) => self.clone(),
            Self::Collection(_) | Self::String(_) => match name {
                Some(name) => match self.get_member(name) {
                    Self::Error(_) => Self::dummy(),
                    v => v,
                },
                None => Self::dummy(),
            },
            _ => Self::dummy(),
        }
    }

    /// Starts iterating. Non-collections give a delayed error, nil iterates
    /// as empty.
    #[must_use]
    pub fn make_iterator(&self) -> Self {
        match self {
            Self::Iterator(_) | Self::Error(_) => self.clone(),
            Self::Nil => Self::iterator(CollectionIterator::new(Rc::new(Collection::new()))),
            Self::Collection(c) => Self::iterator(CollectionIterator::new(c.clone())),
            Self::Object(o) => o.make_iterator().unwrap_or_else(Self::error),
            Self::Abstract(a) => match &**a {
                AbstractValue::Union(x, y) => unified(&x.make_iterator(), &y.make_iterator()),
                _ => Self::dummy(),
            },
            v => Self::error(ScriptError::NotIterable(v.type_name())),
        }
    }

    /// The dependency-analysis counterpart of
    /// [`make_iterator`](Self::make_iterator).
    #[must_use]
    pub fn dependency_iterator(&self, dep: Dependency, sink: &mut dyn DependencySink) -> Self {
        match self {
            Self::Object(o) => o.dependency_iterator(dep, sink),
            Self::Abstract(a) => match &**a {
                AbstractValue::Union(x, y) => {
                    let x = x.dependency_iterator(dep, sink);
                    let y = y.dependency_iterator(dep, sink);
                    unified(&x, &y)
                }
                _ => Self::dummy(),
            },
            Self::Error(_) => Self::dummy(),
            v => match v.make_iterator() {
                Self::Error(_) => Self::dummy(),
                it => it,
            },
        }
    }

    /// Advances an iterator. Abstract values are empty iterators, unions
    /// advance both sides.
    pub fn next_value(&self) -> ScriptResult<Option<Self>> {
        match self {
            Self::Iterator(it) => Ok(it.borrow_mut().next_value()),
            Self::Error(e) => Err((**e).clone()),
            Self::Abstract(a) => match &**a {
                AbstractValue::Union(x, y) => Ok(match (x.next_value()?, y.next_value()?) {
                    (Some(x), Some(y)) => Some(unified(&x, &y)),
                    (Some(v), None) | (None, Some(v)) => Some(v),
                    (None, None) => None,
                }),
                _ => Ok(None),
            },
            v => Err(ScriptError::NotIterable(v.type_name())),
        }
    }

    /// Returns the number of items of a collection-like value.
    pub fn item_count(&self) -> ScriptResult<usize> {
        match self {
            Self::Nil => Ok(0),
            Self::Collection(c) => Ok(c.len()),
            Self::String(s) => Ok(s.chars().count()),
            Self::Object(o) => o
                .item_count()
                .ok_or_else(|| ScriptError::NotIterable(o.type_name().into())),
            Self::Error(e) => Err((**e).clone()),
            Self::Abstract(_) => Ok(0),
            v => Err(ScriptError::NotIterable(v.type_name())),
        }
    }

    /// Identity comparison: the same allocation, or equal immediates.
    #[must_use]
    pub fn is_same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            (Self::Color(a), Self::Color(b)) => a == b,
            (Self::String(a), Self::String(b)) | (Self::Image(a), Self::Image(b)) => {
                Rc::ptr_eq(a, b)
            }
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            (Self::Collection(a), Self::Collection(b)) => Rc::ptr_eq(a, b),
            (Self::Iterator(a), Self::Iterator(b)) => Rc::ptr_eq(a, b),
            (Self::Error(a), Self::Error(b)) => Rc::ptr_eq(a, b),
            (Self::Abstract(a), Self::Abstract(b)) => {
                Rc::ptr_eq(a, b)
                    || matches!((&**a, &**b), (AbstractValue::Dummy, AbstractValue::Dummy))
            }
            _ => false,
        }
    }
}

/// Joins two values from different control-flow paths of an analysis.
#[must_use]
pub fn unified(a: &ScriptValue, b: &ScriptValue) -> ScriptValue {
    if a.is_same(b) {
        a.clone()
    } else {
        ScriptValue::Abstract(Rc::new(AbstractValue::Union(a.clone(), b.clone())))
    }
}

/// Structural equality as the `==` operator sees it.
///
/// Integers and booleans compare by value, mixed numbers approximately,
/// collections element by element. Functions, objects and iterators compare
/// by identity. Everything else compares by text form.
pub fn equal(a: &ScriptValue, b: &ScriptValue) -> ScriptResult<bool> {
    use ScriptValue as V;
    if a.is_same(b) {
        return Ok(true);
    }
    match (a, b) {
        (V::Error(e), _) | (_, V::Error(e)) => Err((**e).clone()),
        (V::Int(x), V::Int(y)) => Ok(x == y),
        (V::Bool(x), V::Bool(y)) => Ok(x == y),
        (V::Int(_) | V::Double(_), V::Int(_) | V::Double(_)) => {
            Ok(approx_equal(a.to_double()?, b.to_double()?))
        }
        (V::Collection(x), V::Collection(y)) => {
            if x.len() != y.len() {
                return Ok(false);
            }
            for (p, q) in x.iter().zip(y.iter()) {
                if !equal(p, q)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (V::Function(_) | V::Iterator(_), _) | (_, V::Function(_) | V::Iterator(_)) => Ok(false),
        (V::Object(x), V::Object(y)) if x.default_value().is_none() => Ok(Rc::ptr_eq(x, y)),
        _ => Ok(a.to_code()? == b.to_code()?),
    }
}

/// Ordering for `<` and friends: numeric when both sides are numbers,
/// otherwise by text form.
pub fn compare(a: &ScriptValue, b: &ScriptValue) -> ScriptResult<Ordering> {
    use ScriptValue as V;
    match (a, b) {
        (V::Int(x), V::Int(y)) => Ok(x.cmp(y)),
        (V::Int(_) | V::Double(_) | V::Nil, V::Int(_) | V::Double(_) | V::Nil) => Ok(a
            .to_double()?
            .partial_cmp(&b.to_double()?)
            .unwrap_or(Ordering::Equal)),
        _ => Ok(a.to_string_value()?.cmp(&b.to_string_value()?)),
    }
}

fn approx_equal(a: f64, b: f64) -> bool {
    a == b || (a - b).abs() < 1e-14
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "float to int conversion saturates, truncation is intended"
)]
fn double_to_int(d: f64) -> i64 {
    d as i64
}

fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().map(double_to_int))
}

fn string_member(s: &str, name: &str) -> ScriptResult<ScriptValue> {
    name.trim()
        .parse::<usize>()
        .ok()
        .and_then(|i| s.chars().nth(i))
        .map(|c| ScriptValue::from(c.to_string()))
        .ok_or_else(|| ScriptError::NoMember {
            type_name: "string".into(),
            name: name.into(),
        })
}

/// Quotes and escapes `s` as a string literal.
#[must_use]
pub fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' | '\\' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_string_value() {
            Ok(s) => f.write_str(&s),
            Err(e) => write!(f, "<error: {e}>"),
        }
    }
}

impl From<bool> for ScriptValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ScriptValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ScriptValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<usize> for ScriptValue {
    fn from(v: usize) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for ScriptValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for ScriptValue {
    fn from(v: &str) -> Self {
        Self::String(v.into())
    }
}

impl From<String> for ScriptValue {
    fn from(v: String) -> Self {
        Self::String(v.into())
    }
}

impl From<Color> for ScriptValue {
    fn from(v: Color) -> Self {
        Self::Color(v)
    }
}

impl From<Collection> for ScriptValue {
    fn from(v: Collection) -> Self {
        Self::Collection(Rc::new(v))
    }
}

impl From<Function> for ScriptValue {
    fn from(v: Function) -> Self {
        Self::Function(Rc::new(v))
    }
}

impl From<ScriptError> for ScriptValue {
    fn from(v: ScriptError) -> Self {
        Self::error(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardscript_dirty::{DependencyRegistry, DependencySource, DependencyType};

    #[test]
    fn text_forms() {
        assert_eq!(ScriptValue::Nil.to_string_value().unwrap(), "");
        assert_eq!(ScriptValue::Int(-3).to_string_value().unwrap(), "-3");
        assert_eq!(ScriptValue::Double(2.5).to_string_value().unwrap(), "2.5");
        assert_eq!(ScriptValue::Double(2.0).to_string_value().unwrap(), "2");
        assert_eq!(ScriptValue::Bool(true).to_string_value().unwrap(), "true");
        assert_eq!(
            ScriptValue::Color(Color::rgb(1, 2, 3)).to_string_value().unwrap(),
            "rgb(1,2,3)"
        );
        let list: Collection = [ScriptValue::from("a"), ScriptValue::Int(1)]
            .into_iter()
            .collect();
        assert_eq!(ScriptValue::from(list).to_string_value().unwrap(), "[\"a\", 1]");
    }

    #[test]
    fn string_to_bool() {
        for (s, b) in [("yes", true), ("true", true), ("no", false), ("false", false), ("", false)] {
            assert_eq!(ScriptValue::from(s).to_bool().unwrap(), b, "{s:?}");
        }
        assert!(matches!(
            ScriptValue::from("maybe").to_bool(),
            Err(ScriptError::Conversion { to: "boolean", .. })
        ));
    }

    #[test]
    fn numeric_conversions() {
        assert_eq!(ScriptValue::from(" 42 ").to_int().unwrap(), 42);
        assert_eq!(ScriptValue::from("2.75").to_int().unwrap(), 2);
        assert_eq!(ScriptValue::Double(-1.9).to_int().unwrap(), -1);
        assert_eq!(ScriptValue::Nil.to_double().unwrap(), 0.0);
        assert!(ScriptValue::from("abc").to_int().is_err());
        assert!(ScriptValue::Color(Color::WHITE).to_int().is_err());
        assert_eq!(ScriptValue::dummy().to_int().unwrap(), 0);
    }

    #[test]
    fn delayed_errors_reraise_on_use() {
        let e = ScriptValue::error(ScriptError::custom("boom"));
        assert_eq!(e.to_string_value().unwrap_err(), ScriptError::custom("boom"));
        assert!(e.to_int().is_err());
        assert!(e.get_member("x").as_error().is_some());
        assert!(e.make_iterator().as_error().is_some());
    }

    #[test]
    fn missing_members_are_delayed() {
        let v = ScriptValue::Int(3).get_member("x");
        assert!(matches!(v.as_error(), Some(ScriptError::NoMember { .. })));
        assert_eq!(
            ScriptValue::from("hey").get_member("1").to_string_value().unwrap(),
            "e"
        );
    }

    #[test]
    fn equality_rules() {
        let eq = |a: ScriptValue, b: ScriptValue| equal(&a, &b).unwrap();
        assert!(eq(ScriptValue::Int(2), ScriptValue::Double(2.0)));
        assert!(eq(ScriptValue::Int(2), ScriptValue::from("2")));
        assert!(!eq(ScriptValue::from("a"), ScriptValue::from("b")));
        // nil has the code form `nil`, not `""`.
        assert!(!eq(ScriptValue::Nil, ScriptValue::from("")));

        let l1: Collection = [1, 2].into_iter().map(ScriptValue::Int).collect();
        let l2: Collection = [1, 2].into_iter().map(ScriptValue::Int).collect();
        assert!(eq(l1.into(), l2.into()));
    }

    #[test]
    fn ordering() {
        let c = |a: ScriptValue, b: ScriptValue| compare(&a, &b).unwrap();
        assert_eq!(c(ScriptValue::Int(2), ScriptValue::Int(10)), Ordering::Less);
        assert_eq!(c(ScriptValue::Double(2.5), ScriptValue::Int(2)), Ordering::Greater);
        assert_eq!(c(ScriptValue::from("b"), ScriptValue::from("a")), Ordering::Greater);
    }

    #[test]
    fn unify_keeps_identical_values() {
        let a = ScriptValue::Int(1);
        assert!(matches!(unified(&a, &a), ScriptValue::Int(1)));
        assert!(unified(&ScriptValue::dummy(), &ScriptValue::dummy()).is_same(&ScriptValue::dummy()));
        let u = unified(&a, &ScriptValue::from("x"));
        assert!(u.type_name().starts_with("union of integer"));
    }

    #[test]
    fn nil_iterates_as_empty() {
        let it = ScriptValue::Nil.make_iterator();
        assert!(it.next_value().unwrap().is_none());
        assert!(ScriptValue::Int(1).make_iterator().as_error().is_some());
    }

    #[test]
    fn abstract_member_access_never_marks_or_fails() {
        let mut registry = DependencyRegistry::new();
        let dep = cardscript_dirty::Dependency::new(DependencyType::SetField, 0);
        let v = ScriptValue::missing_variable("card").dependency_member(Some("x"), dep, &mut registry);
        assert!(v.is_abstract());
        assert!(registry.is_empty());
        assert!(registry.dependents(DependencySource::Cards).is_empty());
    }
}
