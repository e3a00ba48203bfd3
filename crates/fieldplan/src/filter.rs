//! Filter expressions for WHERE and ON clauses.
//!
//! Filters are built from field handles and literals:
//!
//! ```ignore
//! use fieldplan::filter::{equal, greater, or};
//!
//! db.query(&user)
//!     .where_()
//!     .filter([or([equal(user.role, "admin"), greater(user.karma, 100)])])
//!     .select()
//!     .await?;
//! ```
//!
//! Literals become bind values; field handles become `table.column`
//! references resolved against the plan's column map when the statement is
//! compiled.

use crate::colmap::StructColumnMap;
use crate::error::{PlanError, PlanResult};
use crate::field::{Field, FieldRef, FieldToken};
use crate::param::{IntoParam, Param};
use crate::plan::SubQuery;
use crate::statement::Statement;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// One side of a comparison.
#[derive(Debug, Clone)]
pub enum Operand {
    /// A mapped column.
    Field(FieldToken),
    /// A bind value.
    Value(Param),
    /// An SQL template whose `?` markers are replaced by the operands in order.
    Wrapped {
        template: &'static str,
        operands: Vec<Operand>,
    },
}

impl Operand {
    /// Whether any part of this operand references a column.
    pub fn has_field(&self) -> bool {
        match self {
            Operand::Field(_) => true,
            Operand::Value(_) => false,
            Operand::Wrapped { operands, .. } => operands.iter().any(Operand::has_field),
        }
    }

    pub(crate) fn write(&self, cols: &StructColumnMap, out: &mut Statement) -> PlanResult<()> {
        match self {
            Operand::Field(token) => {
                out.push(&cols.locate_table_and_column(*token)?);
            }
            Operand::Value(param) => {
                out.push_bind(param.clone());
            }
            Operand::Wrapped { template, operands } => {
                let mut operands = operands.iter();
                let mut pieces = template.split('?').peekable();
                while let Some(piece) = pieces.next() {
                    out.push(piece);
                    if pieces.peek().is_some() {
                        match operands.next() {
                            Some(operand) => operand.write(cols, out)?,
                            None => {
                                out.push("NULL");
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Conversion into an [`Operand`] compared against a `T` column.
pub trait IntoOperand<T> {
    fn into_operand(self) -> Operand;
}

impl<T> IntoOperand<T> for Field<T> {
    fn into_operand(self) -> Operand {
        Operand::Field(self.token())
    }
}

impl<T> IntoOperand<T> for Wrapped<T> {
    fn into_operand(self) -> Operand {
        Operand::Wrapped {
            template: self.template,
            operands: self.operands,
        }
    }
}

impl<T: ToSql + Send + Sync + 'static> IntoOperand<T> for T {
    fn into_operand(self) -> Operand {
        Operand::Value(Param::new(self))
    }
}

impl<T: ToSql + Send + Sync + 'static> IntoOperand<T> for Option<T> {
    fn into_operand(self) -> Operand {
        Operand::Value(Param::new(self))
    }
}

impl IntoOperand<String> for &str {
    fn into_operand(self) -> Operand {
        Operand::Value(Param::new(self.to_owned()))
    }
}

/// An SQL expression around fields or values, e.g. `lower(?)`.
pub struct Wrapped<T> {
    template: &'static str,
    operands: Vec<Operand>,
    _ty: PhantomData<fn() -> T>,
}

impl<T> Wrapped<T> {
    /// Start a wrapper; add one operand per `?` with [`Wrapped::arg`].
    pub fn new(template: &'static str) -> Self {
        Self {
            template,
            operands: Vec::new(),
            _ty: PhantomData,
        }
    }

    pub fn arg<U>(mut self, operand: impl IntoOperand<U>) -> Self {
        self.operands.push(operand.into_operand());
        self
    }
}

impl<T> fmt::Debug for Wrapped<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wrapped")
            .field("template", &self.template)
            .field("operands", &self.operands)
            .finish()
    }
}

pub fn lower(operand: impl IntoOperand<String>) -> Wrapped<String> {
    Wrapped::new("lower(?)").arg(operand)
}

pub fn upper(operand: impl IntoOperand<String>) -> Wrapped<String> {
    Wrapped::new("upper(?)").arg(operand)
}

pub fn coalesce<T>(field: Field<T>, fallback: impl IntoOperand<T>) -> Wrapped<T> {
    Wrapped::new("coalesce(?, ?)").arg(field).arg(fallback)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Like,
}

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Equal => "=",
            CompareOp::NotEqual => "!=",
            CompareOp::Less => "<",
            CompareOp::LessOrEqual => "<=",
            CompareOp::Greater => ">",
            CompareOp::GreaterOrEqual => ">=",
            CompareOp::Like => "LIKE",
        }
    }
}

/// User-defined filter fragments.
pub trait SqlFilter: fmt::Debug + Send + Sync {
    /// Write the fragment, binding values through `out`.
    fn write(&self, cols: &StructColumnMap, out: &mut Statement) -> PlanResult<()>;
}

/// A boolean expression.
#[derive(Debug, Clone)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    Null {
        operand: Operand,
        negated: bool,
    },
    Truth {
        operand: Operand,
        negated: bool,
    },
    InList {
        operand: Operand,
        values: Vec<Param>,
    },
    InSubQuery {
        operand: Operand,
        query: Statement,
    },
    /// Pre-rendered `left.col = right.col`, derived from relations.
    Reference(String),
    /// A filter that could not be built; compiling it yields the error.
    Invalid(PlanError),
    Custom(Arc<dyn SqlFilter>),
}

impl Filter {
    pub fn reference(left_table: &str, left_col: &str, right_table: &str, right_col: &str) -> Self {
        Filter::Reference(format!("{left_table}.{left_col} = {right_table}.{right_col}"))
    }

    pub fn custom(filter: impl SqlFilter + 'static) -> Self {
        Filter::Custom(Arc::new(filter))
    }

    /// Write the filter, appending bind values in emission order.
    pub fn write(&self, cols: &StructColumnMap, out: &mut Statement) -> PlanResult<()> {
        match self {
            Filter::And(filters) => write_joined(filters, " AND ", "1=1", cols, out)?,
            Filter::Or(filters) => write_joined(filters, " OR ", "1=0", cols, out)?,
            Filter::Not(inner) => {
                out.push("NOT (");
                inner.write(cols, out)?;
                out.push(")");
            }
            Filter::Compare { left, op, right } => {
                left.write(cols, out)?;
                out.push(" ").push(op.as_sql()).push(" ");
                right.write(cols, out)?;
            }
            Filter::Null { operand, negated } => {
                operand.write(cols, out)?;
                out.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Filter::Truth { operand, negated } => {
                if *negated {
                    out.push("NOT ");
                }
                operand.write(cols, out)?;
            }
            Filter::InList { operand, values } => {
                if values.is_empty() {
                    out.push("1=0");
                } else {
                    operand.write(cols, out)?;
                    out.push(" IN (");
                    out.push_bind_list(values.iter().cloned());
                    out.push(")");
                }
            }
            Filter::InSubQuery { operand, query } => {
                operand.write(cols, out)?;
                out.push(" IN (");
                out.append(query);
                out.push(")");
            }
            Filter::Reference(clause) => {
                out.push(clause);
            }
            Filter::Invalid(err) => return Err(err.clone()),
            Filter::Custom(filter) => filter.write(cols, out)?,
        }
        Ok(())
    }

    fn is_group(&self) -> bool {
        matches!(self, Filter::And(_) | Filter::Or(_))
    }
}

fn write_joined(
    filters: &[Filter],
    sep: &str,
    empty: &str,
    cols: &StructColumnMap,
    out: &mut Statement,
) -> PlanResult<()> {
    if filters.is_empty() {
        out.push(empty);
        return Ok(());
    }
    for (idx, filter) in filters.iter().enumerate() {
        if idx > 0 {
            out.push(sep);
        }
        let nested = filters.len() > 1 && filter.is_group();
        if nested {
            out.push("(");
        }
        filter.write(cols, out)?;
        if nested {
            out.push(")");
        }
    }
    Ok(())
}

fn compare<T>(left: impl IntoOperand<T>, op: CompareOp, right: impl IntoOperand<T>) -> Filter {
    Filter::Compare {
        left: left.into_operand(),
        op,
        right: right.into_operand(),
    }
}

pub fn equal<T>(left: impl IntoOperand<T>, right: impl IntoOperand<T>) -> Filter {
    compare(left, CompareOp::Equal, right)
}

pub fn not_equal<T>(left: impl IntoOperand<T>, right: impl IntoOperand<T>) -> Filter {
    compare(left, CompareOp::NotEqual, right)
}

pub fn less<T>(left: impl IntoOperand<T>, right: impl IntoOperand<T>) -> Filter {
    compare(left, CompareOp::Less, right)
}

pub fn less_or_equal<T>(left: impl IntoOperand<T>, right: impl IntoOperand<T>) -> Filter {
    compare(left, CompareOp::LessOrEqual, right)
}

pub fn greater<T>(left: impl IntoOperand<T>, right: impl IntoOperand<T>) -> Filter {
    compare(left, CompareOp::Greater, right)
}

pub fn greater_or_equal<T>(left: impl IntoOperand<T>, right: impl IntoOperand<T>) -> Filter {
    compare(left, CompareOp::GreaterOrEqual, right)
}

pub fn like(left: impl IntoOperand<String>, pattern: impl IntoOperand<String>) -> Filter {
    compare(left, CompareOp::Like, pattern)
}

pub fn null(field: impl FieldRef) -> Filter {
    Filter::Null {
        operand: Operand::Field(field.field_token()),
        negated: false,
    }
}

pub fn not_null(field: impl FieldRef) -> Filter {
    Filter::Null {
        operand: Operand::Field(field.field_token()),
        negated: true,
    }
}

pub fn is_true(field: impl IntoOperand<bool>) -> Filter {
    Filter::Truth {
        operand: field.into_operand(),
        negated: false,
    }
}

pub fn is_false(field: impl IntoOperand<bool>) -> Filter {
    Filter::Truth {
        operand: field.into_operand(),
        negated: true,
    }
}

pub fn in_list<T, V: IntoParam<T>>(
    field: impl IntoOperand<T>,
    values: impl IntoIterator<Item = V>,
) -> Filter {
    Filter::InList {
        operand: field.into_operand(),
        values: values.into_iter().map(IntoParam::into_param).collect(),
    }
}

/// `field IN (<sub-query>)`. Construction errors of the sub-query carry over.
pub fn in_sub_query<T>(field: impl IntoOperand<T>, query: &dyn SubQuery) -> Filter {
    if let Some(err) = query.plan_errors().first() {
        return Filter::Invalid(err.clone());
    }
    match query.select_statement() {
        Ok(query) => Filter::InSubQuery {
            operand: field.into_operand(),
            query,
        },
        Err(err) => Filter::Invalid(err),
    }
}

pub fn and(filters: impl IntoIterator<Item = Filter>) -> Filter {
    Filter::And(filters.into_iter().collect())
}

pub fn or(filters: impl IntoIterator<Item = Filter>) -> Filter {
    Filter::Or(filters.into_iter().collect())
}

pub fn not(filter: Filter) -> Filter {
    Filter::Not(Box::new(filter))
}
