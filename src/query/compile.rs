#![forbid(unsafe_code)]

//! Filter compilation.
//!
//! Each node kind has one compiler function. The functions are registered in
//! a dispatch table that is built on first use and only read afterwards; it
//! is the single place new node kinds are wired in. Compilation resolves
//! property paths (registering joins), coerces literals to the leaf type, and
//! checks that the operator applies to that type.

use std::collections::HashMap;
use std::sync::OnceLock;

use tracing::debug;

use super::ast::{
    ComparisonOperator, Expression, LogicalOperator, MembershipOperator, NodeKind,
    PresenceOperator,
};
use super::coerce::coerce;
use super::errors::{CompileError, SearchError, ValidationError};
use super::predicate::{CompareOp, CompiledFilter, CompiledQuery, Predicate, SortKey, StringMatch};
use super::request::SortExpression;
use super::resolve::{ColumnRef, Join, PathResolver};
use super::schema::{LeafType, SchemaProvider};

/// Convenience alias for compiler results.
pub type CompileResult<T> = std::result::Result<T, SearchError>;

type NodeCompiler = fn(&Expression, &mut Compiler<'_>) -> CompileResult<Predicate>;

struct DispatchTable {
    compilers: HashMap<NodeKind, NodeCompiler>,
}

impl DispatchTable {
    fn builtin() -> Self {
        let mut compilers: HashMap<NodeKind, NodeCompiler> = HashMap::new();
        compilers.insert(NodeKind::LogicalMulti, compile_logical_multi);
        compilers.insert(NodeKind::LogicalSingle, compile_logical_single);
        compilers.insert(NodeKind::ComparisonSingle, compile_single_value);
        compilers.insert(NodeKind::ComparisonMulti, compile_multi_value);
        compilers.insert(NodeKind::ComparisonRange, compile_range);
        compilers.insert(NodeKind::ComparisonNone, compile_no_value);
        Self { compilers }
    }

    fn get(&self, kind: NodeKind) -> Option<NodeCompiler> {
        self.compilers.get(&kind).copied()
    }
}

static DISPATCH: OnceLock<DispatchTable> = OnceLock::new();

fn dispatch() -> &'static DispatchTable {
    DISPATCH.get_or_init(DispatchTable::builtin)
}

/// One compilation pass over a root entity.
///
/// Joins registered while compiling the filter are shared with sort keys
/// resolved through the same compiler.
pub struct Compiler<'s> {
    resolver: PathResolver<'s>,
}

impl<'s> Compiler<'s> {
    /// Starts a pass over `root`.
    pub fn new(schema: &'s dyn SchemaProvider, root: &str) -> CompileResult<Self> {
        let resolver = PathResolver::new(schema, root).ok_or_else(|| SearchError::UnknownEntity {
            entity: root.to_owned(),
        })?;
        Ok(Self { resolver })
    }

    /// Compiles one filter node.
    pub fn compile(&mut self, expr: &Expression) -> CompileResult<Predicate> {
        let compiler = dispatch().get(expr.kind()).ok_or_else(|| unsupported(expr))?;
        compiler(expr, self)
    }

    /// Resolves a sort directive to a sort key.
    pub fn sort_key(&mut self, sort: &SortExpression) -> CompileResult<SortKey> {
        let column = self.resolver.resolve(&sort.property)?;
        Ok(SortKey {
            column,
            direction: sort.mode,
        })
    }

    /// Root entity of this pass.
    pub fn root(&self) -> &str {
        self.resolver.root()
    }

    /// Ends the pass, returning the registered joins.
    pub fn into_joins(self) -> Vec<Join> {
        self.resolver.into_joins()
    }

    fn column(&mut self, property: &str) -> CompileResult<ColumnRef> {
        Ok(self.resolver.resolve(property)?)
    }
}

/// Compiles a filter over `root` into a predicate plus its joins.
pub fn compile(
    expr: &Expression,
    schema: &dyn SchemaProvider,
    root: &str,
) -> CompileResult<CompiledFilter> {
    let mut compiler = Compiler::new(schema, root)?;
    let predicate = compiler.compile(expr)?;
    let joins = compiler.into_joins();
    debug!(root, joins = joins.len(), "compiled filter");
    Ok(CompiledFilter {
        root: root.to_owned(),
        joins,
        predicate,
    })
}

/// Compiles an optional filter and sort directives in one pass.
pub fn compile_query(
    filter: Option<&Expression>,
    sorts: &[SortExpression],
    schema: &dyn SchemaProvider,
    root: &str,
) -> CompileResult<CompiledQuery> {
    let mut compiler = Compiler::new(schema, root)?;
    let predicate = filter.map(|expr| compiler.compile(expr)).transpose()?;
    let sorts = sorts
        .iter()
        .map(|sort| compiler.sort_key(sort))
        .collect::<CompileResult<Vec<_>>>()?;
    let joins = compiler.into_joins();
    debug!(
        root,
        joins = joins.len(),
        sorts = sorts.len(),
        filtered = predicate.is_some(),
        "compiled query"
    );
    Ok(CompiledQuery {
        root: root.to_owned(),
        joins,
        predicate,
        sorts,
    })
}

fn unsupported(expr: &Expression) -> SearchError {
    CompileError::Unsupported {
        node: expr.to_string(),
    }
    .into()
}

fn ensure_orderable(operator: &'static str, column: &ColumnRef) -> CompileResult<()> {
    if column.leaf.is_orderable() {
        Ok(())
    } else {
        Err(CompileError::NotOrderable {
            operator,
            property: column.path.clone(),
            leaf: column.leaf.to_string(),
        }
        .into())
    }
}

fn ensure_string(operator: &'static str, column: &ColumnRef) -> CompileResult<()> {
    if column.leaf == LeafType::String {
        Ok(())
    } else {
        Err(CompileError::NotAString {
            operator,
            property: column.path.clone(),
            leaf: column.leaf.to_string(),
        }
        .into())
    }
}

fn compile_logical_multi(expr: &Expression, compiler: &mut Compiler<'_>) -> CompileResult<Predicate> {
    let Expression::LogicalMulti(node) = expr else {
        return Err(unsupported(expr));
    };
    let children = node
        .operands
        .iter()
        .map(|operand| compiler.compile(operand))
        .collect::<CompileResult<Vec<_>>>()?;
    Ok(match node.operator {
        LogicalOperator::And => Predicate::And(children),
        LogicalOperator::Or => Predicate::Or(children),
    })
}

fn compile_logical_single(expr: &Expression, compiler: &mut Compiler<'_>) -> CompileResult<Predicate> {
    let Expression::LogicalSingle(node) = expr else {
        return Err(unsupported(expr));
    };
    Ok(Predicate::Not(Box::new(compiler.compile(&node.operand)?)))
}

fn compile_single_value(expr: &Expression, compiler: &mut Compiler<'_>) -> CompileResult<Predicate> {
    let Expression::ComparisonSingle(node) = expr else {
        return Err(unsupported(expr));
    };
    let column = compiler.column(&node.property)?;
    let op_name = node.operator.name();
    let ordered = |op: CompareOp, column: ColumnRef| -> CompileResult<Predicate> {
        ensure_orderable(op_name, &column)?;
        let value = coerce(&node.value, &column.leaf)?;
        Ok(Predicate::Compare { column, op, value })
    };
    let like = |kind: StringMatch, column: ColumnRef| -> CompileResult<Predicate> {
        ensure_string(op_name, &column)?;
        Ok(Predicate::Like {
            column,
            kind,
            pattern: node.value.clone(),
        })
    };
    match node.operator {
        ComparisonOperator::Equal | ComparisonOperator::NotEqual => {
            let value = coerce(&node.value, &column.leaf)?;
            let eq = Predicate::Compare {
                column,
                op: CompareOp::Eq,
                value,
            };
            Ok(if node.operator == ComparisonOperator::Equal {
                eq
            } else {
                Predicate::Not(Box::new(eq))
            })
        }
        ComparisonOperator::LessThan => ordered(CompareOp::Lt, column),
        ComparisonOperator::LessThanEqual => ordered(CompareOp::Le, column),
        ComparisonOperator::GreaterThan => ordered(CompareOp::Gt, column),
        ComparisonOperator::GreaterThanEqual => ordered(CompareOp::Ge, column),
        ComparisonOperator::StartsWith => like(StringMatch::Prefix, column),
        ComparisonOperator::EndsWith => like(StringMatch::Suffix, column),
        ComparisonOperator::Contains => like(StringMatch::Contains, column),
    }
}

fn compile_multi_value(expr: &Expression, compiler: &mut Compiler<'_>) -> CompileResult<Predicate> {
    let Expression::ComparisonMulti(node) = expr else {
        return Err(unsupported(expr));
    };
    let column = compiler.column(&node.property)?;
    let mut values = Vec::with_capacity(node.values.len());
    for (index, literal) in node.values.iter().enumerate() {
        let literal = literal.as_deref().ok_or_else(|| ValidationError::NullValue {
            index,
            node: expr.to_string(),
        })?;
        values.push(coerce(literal, &column.leaf)?);
    }
    let membership = Predicate::In { column, values };
    Ok(match node.operator {
        MembershipOperator::In => membership,
        MembershipOperator::NotIn => Predicate::Not(Box::new(membership)),
    })
}

fn compile_range(expr: &Expression, compiler: &mut Compiler<'_>) -> CompileResult<Predicate> {
    let Expression::ComparisonRange(node) = expr else {
        return Err(unsupported(expr));
    };
    let column = compiler.column(&node.property)?;
    ensure_orderable(node.operator.name(), &column)?;
    let low = coerce(&node.start, &column.leaf)?;
    let high = coerce(&node.end, &column.leaf)?;
    Ok(Predicate::Between { column, low, high })
}

fn compile_no_value(expr: &Expression, compiler: &mut Compiler<'_>) -> CompileResult<Predicate> {
    let Expression::ComparisonNone(node) = expr else {
        return Err(unsupported(expr));
    };
    let column = compiler.column(&node.property)?;
    Ok(match node.operator {
        PresenceOperator::Empty => Predicate::IsNull(column),
        PresenceOperator::NotEmpty => Predicate::IsNotNull(column),
    })
}
