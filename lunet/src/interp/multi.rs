//! Multiple results of one evaluation

use super::value::Value;

/// Zero, one or many values produced together, e.g. by a call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiValue(Vec<Value>);

impl MultiValue {
    pub fn new(values: Vec<Value>) -> Self {
        MultiValue(values)
    }

    pub fn empty() -> Self {
        MultiValue(Vec::new())
    }

    pub fn one(value: impl Into<Value>) -> Self {
        MultiValue(vec![value.into()])
    }

    pub fn pair(first: impl Into<Value>, second: impl Into<Value>) -> Self {
        MultiValue(vec![first.into(), second.into()])
    }

    /// Concatenate several results into one flat sequence, in order.
    pub fn flatten(parts: impl IntoIterator<Item = MultiValue>) -> Self {
        MultiValue(parts.into_iter().flat_map(|part| part.0).collect())
    }

    /// First value, or nil when there are none
    pub fn first(&self) -> Value {
        self.0.first().cloned().unwrap_or_default()
    }

    /// Consume and keep only the first value
    pub fn unwrap(self) -> Value {
        self.0.into_iter().next().unwrap_or_default()
    }

    /// Value at a 0-based position, nil past the end
    pub fn get(&self, index: usize) -> Value {
        self.0.get(index).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, value: Value) {
        self.0.push(value);
    }

    pub fn extend(&mut self, other: MultiValue) {
        self.0.extend(other.0);
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }
}

impl From<Value> for MultiValue {
    fn from(value: Value) -> Self {
        MultiValue(vec![value])
    }
}

impl From<Vec<Value>> for MultiValue {
    fn from(values: Vec<Value>) -> Self {
        MultiValue(values)
    }
}

impl FromIterator<Value> for MultiValue {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        MultiValue(iter.into_iter().collect())
    }
}

impl IntoIterator for MultiValue {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_first_or_nil() {
        assert_eq!(MultiValue::empty().unwrap(), Value::Nil);
        assert_eq!(MultiValue::pair(1.0, 2.0).unwrap(), Value::Number(1.0));
        assert_eq!(MultiValue::empty().first(), Value::Nil);
    }

    #[test]
    fn test_flatten_absorbs_nested_results() {
        let flat = MultiValue::flatten([
            MultiValue::one(true),
            MultiValue::empty(),
            MultiValue::new(vec![Value::from(1.0), Value::from(2.0)]),
            MultiValue::one("x"),
        ]);
        assert_eq!(
            flat.into_vec(),
            vec![Value::Boolean(true), Value::Number(1.0), Value::Number(2.0), Value::from("x")]
        );
    }

    #[test]
    fn test_get_past_end_is_nil() {
        let mv = MultiValue::one(5.0);
        assert_eq!(mv.get(0), Value::Number(5.0));
        assert_eq!(mv.get(3), Value::Nil);
    }
}
