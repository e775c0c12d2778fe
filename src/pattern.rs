//! Executor for parsed `MATCH ... RETURN` queries over a [`SqliteGraph`].
//!
//! The path is matched left to right by expanding each hop through the
//! adjacency cache. Bindings that pass every `WHERE` condition are grouped on
//! the non-aggregate return items, then sorted and limited.

use std::cmp::Ordering;

use ahash::AHashMap;

use crate::{
    backend::{QueryParams, QueryRow, QueryValue},
    dsl::{
        AggregateFn, CompareOp, Condition, Direction, NodePattern, Operand, PatternQuery,
        ReturnExpr,
    },
    errors::MovieKgError,
    graph::{GraphEdge, GraphEntity, SqliteGraph},
};

#[derive(Clone, Debug, PartialEq)]
enum Bound {
    Node(i64),
    Edge { id: i64, edge_type: String },
}

/// One partial or complete path match.
#[derive(Clone, Debug, Default)]
struct Binding {
    vars: Vec<(String, Bound)>,
    edges: Vec<i64>,
    current: i64,
}

impl Binding {
    fn get(&self, var: &str) -> Option<&Bound> {
        self.vars
            .iter()
            .find(|(name, _)| name == var)
            .map(|(_, bound)| bound)
    }

    /// Binds `var`, or checks a repeated variable refers to the same element.
    fn bind(&mut self, var: &str, value: Bound) -> bool {
        match self.get(var) {
            Some(existing) => *existing == value,
            None => {
                self.vars.push((var.to_owned(), value));
                true
            }
        }
    }
}

struct Matcher<'a> {
    graph: &'a SqliteGraph,
    params: &'a QueryParams,
    entities: AHashMap<i64, GraphEntity>,
}

impl<'a> Matcher<'a> {
    fn entity(&mut self, id: i64) -> Result<GraphEntity, MovieKgError> {
        if let Some(entity) = self.entities.get(&id) {
            return Ok(entity.clone());
        }
        let entity = self.graph.get_entity(id)?;
        self.entities.insert(id, entity.clone());
        Ok(entity)
    }

    fn node_matches(
        &mut self,
        entity: &GraphEntity,
        pattern: &NodePattern,
        binding: &Binding,
    ) -> Result<bool, MovieKgError> {
        if let Some(label) = &pattern.label {
            if &entity.kind != label {
                return Ok(false);
            }
        }
        for (key, operand) in &pattern.props {
            let expected = self.operand(operand, binding)?;
            let actual = entity.property(key);
            if actual.is_null() || !actual.loosely_equals(&expected) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn operand(
        &mut self,
        operand: &Operand,
        binding: &Binding,
    ) -> Result<QueryValue, MovieKgError> {
        match operand {
            Operand::Param(name) => self
                .params
                .get(name)
                .cloned()
                .ok_or_else(|| MovieKgError::query(format!("missing parameter ${name}"))),
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Property { var, key } => self.property(binding, var, key),
        }
    }

    fn property(
        &mut self,
        binding: &Binding,
        var: &str,
        key: &str,
    ) -> Result<QueryValue, MovieKgError> {
        match binding.get(var) {
            Some(Bound::Node(id)) => Ok(self.entity(*id)?.property(key)),
            Some(Bound::Edge { .. }) => Ok(QueryValue::Null),
            None => Err(MovieKgError::query(format!("unknown variable {var}"))),
        }
    }

    fn variable(&mut self, binding: &Binding, var: &str) -> Result<QueryValue, MovieKgError> {
        match binding.get(var) {
            Some(Bound::Node(id)) => Ok(QueryValue::Text(self.entity(*id)?.key)),
            Some(Bound::Edge { edge_type, .. }) => Ok(QueryValue::Text(edge_type.clone())),
            None => Err(MovieKgError::query(format!("unknown variable {var}"))),
        }
    }

    fn scalar(&mut self, expr: &ReturnExpr, binding: &Binding) -> Result<QueryValue, MovieKgError> {
        match expr {
            ReturnExpr::Variable(var) => self.variable(binding, var),
            ReturnExpr::Property { var, key } => self.property(binding, var, key),
            ReturnExpr::Aggregate { .. } => Err(MovieKgError::query(format!(
                "aggregate {} used outside RETURN",
                expr.source()
            ))),
        }
    }

    fn condition_holds(
        &mut self,
        condition: &Condition,
        binding: &Binding,
    ) -> Result<bool, MovieKgError> {
        let left = self.operand(&condition.left, binding)?;
        let right = self.operand(&condition.right, binding)?;
        Ok(compare(condition.op, &left, &right))
    }

    fn aggregate(
        &mut self,
        func: AggregateFn,
        distinct: bool,
        arg: Option<&ReturnExpr>,
        members: &[&Binding],
    ) -> Result<QueryValue, MovieKgError> {
        let Some(arg) = arg else {
            return Ok(QueryValue::Integer(members.len() as i64));
        };
        let mut values = Vec::new();
        for binding in members {
            let value = self.scalar(arg, binding)?;
            if value.is_null() || (distinct && values.contains(&value)) {
                continue;
            }
            values.push(value);
        }
        Ok(match func {
            AggregateFn::Count => QueryValue::Integer(values.len() as i64),
            AggregateFn::Collect => QueryValue::List(values),
            AggregateFn::Min => values
                .into_iter()
                .min_by(|a, b| a.compare(b))
                .unwrap_or(QueryValue::Null),
            AggregateFn::Max => values
                .into_iter()
                .max_by(|a, b| a.compare(b))
                .unwrap_or(QueryValue::Null),
            AggregateFn::Sum => {
                if values.iter().all(|v| matches!(v, QueryValue::Integer(_))) {
                    QueryValue::Integer(values.iter().filter_map(QueryValue::as_i64).sum())
                } else {
                    QueryValue::Float(values.iter().filter_map(QueryValue::as_f64).sum())
                }
            }
            AggregateFn::Avg => {
                let numbers: Vec<f64> = values.iter().filter_map(QueryValue::as_f64).collect();
                if numbers.is_empty() {
                    QueryValue::Null
                } else {
                    QueryValue::Float(numbers.iter().sum::<f64>() / numbers.len() as f64)
                }
            }
        })
    }
}

/// Runs a parsed pattern query: match, filter, project (grouping when the
/// projection contains aggregates), order, limit.
pub fn execute_pattern(
    graph: &SqliteGraph,
    query: &PatternQuery,
    params: &QueryParams,
) -> Result<Vec<QueryRow>, MovieKgError> {
    let mut matcher = Matcher {
        graph,
        params,
        entities: AHashMap::new(),
    };
    let matches = match_path(&mut matcher, query)?;

    let mut kept = Vec::new();
    'bindings: for binding in matches {
        for condition in &query.filters {
            if !matcher.condition_holds(condition, &binding)? {
                continue 'bindings;
            }
        }
        kept.push(binding);
    }

    let mut rows = project(&mut matcher, query, &kept)?;
    order_rows(query, &mut rows)?;
    if let Some(limit) = query.limit {
        rows.truncate(limit);
    }
    Ok(rows)
}

fn match_path(
    matcher: &mut Matcher<'_>,
    query: &PatternQuery,
) -> Result<Vec<Binding>, MovieKgError> {
    let mut sequences = Vec::new();
    for entity in matcher.graph.entities(query.start.label.as_deref())? {
        let mut binding = Binding {
            current: entity.id,
            ..Binding::default()
        };
        if !matcher.node_matches(&entity, &query.start, &binding)? {
            continue;
        }
        if let Some(var) = &query.start.var {
            binding.bind(var, Bound::Node(entity.id));
        }
        matcher.entities.insert(entity.id, entity);
        sequences.push(binding);
    }

    for hop in &query.hops {
        let mut next_sequences = Vec::new();
        for binding in &sequences {
            let edges: Vec<GraphEdge> = match hop.rel.direction {
                Direction::Outgoing => matcher.graph.outgoing(binding.current)?,
                Direction::Incoming => matcher.graph.incoming(binding.current)?,
            };
            for edge in edges {
                if let Some(edge_type) = &hop.rel.edge_type {
                    if &edge.edge_type != edge_type {
                        continue;
                    }
                }
                if binding.edges.contains(&edge.id) {
                    continue;
                }
                let neighbor = match hop.rel.direction {
                    Direction::Outgoing => edge.to_id,
                    Direction::Incoming => edge.from_id,
                };
                let entity = matcher.entity(neighbor)?;
                if !matcher.node_matches(&entity, &hop.node, binding)? {
                    continue;
                }
                let mut extended = binding.clone();
                if let Some(var) = &hop.rel.var {
                    let bound = Bound::Edge {
                        id: edge.id,
                        edge_type: edge.edge_type.clone(),
                    };
                    if !extended.bind(var, bound) {
                        continue;
                    }
                }
                if let Some(var) = &hop.node.var {
                    if !extended.bind(var, Bound::Node(neighbor)) {
                        continue;
                    }
                }
                extended.edges.push(edge.id);
                extended.current = neighbor;
                next_sequences.push(extended);
            }
        }
        if next_sequences.is_empty() {
            return Ok(Vec::new());
        }
        sequences = next_sequences;
    }
    Ok(sequences)
}

fn project(
    matcher: &mut Matcher<'_>,
    query: &PatternQuery,
    bindings: &[Binding],
) -> Result<Vec<QueryRow>, MovieKgError> {
    let grouped = query.returns.iter().any(|item| item.expr.is_aggregate());
    if !grouped {
        let mut rows = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let mut row = QueryRow::new();
            for item in &query.returns {
                row.push(item.alias.clone(), matcher.scalar(&item.expr, binding)?);
            }
            rows.push(row);
        }
        return Ok(rows);
    }

    let mut groups: Vec<(Vec<QueryValue>, Vec<&Binding>)> = Vec::new();
    for binding in bindings {
        let mut key = Vec::new();
        for item in query.returns.iter().filter(|item| !item.expr.is_aggregate()) {
            key.push(matcher.scalar(&item.expr, binding)?);
        }
        match groups.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, members)) => members.push(binding),
            None => groups.push((key, vec![binding])),
        }
    }
    let aggregates_only = query.returns.iter().all(|item| item.expr.is_aggregate());
    if groups.is_empty() && aggregates_only {
        groups.push((Vec::new(), Vec::new()));
    }

    let mut rows = Vec::with_capacity(groups.len());
    for (key, members) in groups {
        let mut key_values = key.into_iter();
        let mut row = QueryRow::new();
        for item in &query.returns {
            let value = match &item.expr {
                ReturnExpr::Aggregate {
                    func,
                    distinct,
                    arg,
                } => matcher.aggregate(*func, *distinct, arg.as_deref(), &members)?,
                _ => key_values.next().unwrap_or(QueryValue::Null),
            };
            row.push(item.alias.clone(), value);
        }
        rows.push(row);
    }
    Ok(rows)
}

fn order_rows(query: &PatternQuery, rows: &mut [QueryRow]) -> Result<(), MovieKgError> {
    if query.order_by.is_empty() {
        return Ok(());
    }
    let mut keys = Vec::with_capacity(query.order_by.len());
    for key in &query.order_by {
        let item = query
            .returns
            .iter()
            .find(|item| item.alias == key.column || item.expr.source() == key.column)
            .ok_or_else(|| {
                MovieKgError::query(format!(
                    "ORDER BY {} must name a returned column",
                    key.column
                ))
            })?;
        keys.push((item.alias.as_str(), key.descending));
    }
    rows.sort_by(|a, b| {
        for (column, descending) in &keys {
            let left = a.get(column).unwrap_or(&QueryValue::Null);
            let right = b.get(column).unwrap_or(&QueryValue::Null);
            let ord = left.compare(right);
            let ord = if *descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
    Ok(())
}

fn compare(op: CompareOp, left: &QueryValue, right: &QueryValue) -> bool {
    if left.is_null() || right.is_null() {
        return false;
    }
    match op {
        CompareOp::Eq => left.loosely_equals(right),
        CompareOp::Ne => !left.loosely_equals(right),
        CompareOp::Lt => left.compare(right) == Ordering::Less,
        CompareOp::Le => left.compare(right) != Ordering::Greater,
        CompareOp::Gt => left.compare(right) == Ordering::Greater,
        CompareOp::Ge => left.compare(right) != Ordering::Less,
    }
}
