//! Weak forms built from trial and test functions.
//!
//! Expressions are small trees over trial and test functions of a space. [`inner`] walks both
//! sides once, expands them into separable terms (a coefficient and one derivative order per
//! axis) and pairs test and trial terms into [`TPMatrix`] terms whose per-axis coupling
//! matrices come from the cache of the trial space.
use crate::array::{Array, Function};
use crate::error::{Error, Result};
use crate::matrix::TPMatrix;
use crate::space::TensorProductSpace;
use num::complex::Complex64;
use std::ops::{Add, Mul, Neg, Sub};
use std::sync::Arc;

/// A handle to the trial functions of a space.
#[derive(Debug, Clone)]
pub struct TrialFunction {
    space: Arc<TensorProductSpace>,
}

impl TrialFunction {
    pub fn new(space: &Arc<TensorProductSpace>) -> Self {
        Self {
            space: Arc::clone(space),
        }
    }

    pub fn space(&self) -> &Arc<TensorProductSpace> {
        &self.space
    }
}

/// A handle to the test functions of a space.
#[derive(Debug, Clone)]
pub struct TestFunction {
    space: Arc<TensorProductSpace>,
}

impl TestFunction {
    pub fn new(space: &Arc<TensorProductSpace>) -> Self {
        Self {
            space: Arc::clone(space),
        }
    }

    pub fn space(&self) -> &Arc<TensorProductSpace> {
        &self.space
    }
}

/// A linear expression in either trial or test functions.
#[derive(Debug, Clone)]
pub enum Expr {
    Trial(Arc<TensorProductSpace>),
    Test(Arc<TensorProductSpace>),
    /// The `order`-th derivative along `axis`.
    Derivative {
        axis: usize,
        order: usize,
        expr: Box<Expr>,
    },
    Scale(f64, Box<Expr>),
    Sum(Vec<Expr>),
    /// A vector with one scalar expression per component.
    Vector(Vec<Expr>),
    /// The divergence of a vector expression.
    Div(Box<Expr>),
}

impl Expr {
    /// The space of the first trial or test function in the expression.
    pub fn space(&self) -> Option<&Arc<TensorProductSpace>> {
        match self {
            Self::Trial(space) | Self::Test(space) => Some(space),
            Self::Derivative { expr, .. } | Self::Scale(_, expr) | Self::Div(expr) => expr.space(),
            Self::Sum(exprs) | Self::Vector(exprs) => exprs.iter().find_map(Expr::space),
        }
    }
}

impl From<&TrialFunction> for Expr {
    fn from(u: &TrialFunction) -> Self {
        Self::Trial(Arc::clone(&u.space))
    }
}

impl From<TrialFunction> for Expr {
    fn from(u: TrialFunction) -> Self {
        Self::Trial(u.space)
    }
}

impl From<&TestFunction> for Expr {
    fn from(v: &TestFunction) -> Self {
        Self::Test(Arc::clone(&v.space))
    }
}

impl From<TestFunction> for Expr {
    fn from(v: TestFunction) -> Self {
        Self::Test(v.space)
    }
}

impl From<&Expr> for Expr {
    fn from(expr: &Expr) -> Self {
        expr.clone()
    }
}

impl Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        match self {
            Self::Sum(mut terms) => {
                terms.push(rhs);
                Self::Sum(terms)
            }
            lhs => Self::Sum(vec![lhs, rhs]),
        }
    }
}

impl Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        self + (-rhs)
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        -1.0 * self
    }
}

impl Mul<Expr> for f64 {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        Expr::Scale(self, Box::new(rhs))
    }
}

impl Mul<f64> for Expr {
    type Output = Expr;

    fn mul(self, rhs: f64) -> Expr {
        Expr::Scale(rhs, Box::new(self))
    }
}

/// The `order`-th partial derivative along `axis`.
#[allow(non_snake_case)]
pub fn Dx(expr: impl Into<Expr>, axis: usize, order: usize) -> Expr {
    Expr::Derivative {
        axis,
        order,
        expr: Box::new(expr.into()),
    }
}

/// The vector of first derivatives along every axis.
pub fn grad(expr: impl Into<Expr>) -> Expr {
    let expr = expr.into();
    let dim = expr.space().map(|space| space.dim()).unwrap_or(0);
    Expr::Vector((0..dim).map(|axis| Dx(expr.clone(), axis, 1)).collect())
}

/// The divergence of a vector expression, such as the result of [`grad`].
pub fn div(expr: impl Into<Expr>) -> Expr {
    Expr::Div(Box::new(expr.into()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Trial,
    Test,
}

/// A coefficient times a product of one derivative per axis.
#[derive(Debug, Clone, PartialEq)]
struct Term {
    coefficient: f64,
    orders: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
enum Lowered {
    Scalar(Vec<Term>),
    Vector(Vec<Vec<Term>>),
}

struct Leaf {
    role: Role,
    space: Arc<TensorProductSpace>,
}

fn lower(expr: &Expr, leaf: &mut Option<Leaf>) -> Result<Lowered> {
    match expr {
        Expr::Trial(space) | Expr::Test(space) => {
            let role = if matches!(expr, Expr::Trial(_)) { Role::Trial } else { Role::Test };
            match leaf {
                Some(existing) if existing.role != role || !Arc::ptr_eq(&existing.space, space) => {
                    return Err(Error::unsupported(
                        "an expression must be linear in a single trial or test function",
                    ))
                }
                Some(_) => {}
                None => {
                    *leaf = Some(Leaf {
                        role,
                        space: Arc::clone(space),
                    })
                }
            }
            Ok(Lowered::Scalar(vec![Term {
                coefficient: 1.0,
                orders: vec![0; space.dim()],
            }]))
        }
        Expr::Derivative { axis, order, expr } => {
            let mut lowered = lower(expr, leaf)?;
            let add_order = |terms: &mut Vec<Term>| -> Result<()> {
                for term in terms {
                    let entry = term.orders.get_mut(*axis).ok_or_else(|| {
                        Error::configuration(format!("derivative along axis {axis} of a lower-dimensional space"))
                    })?;
                    *entry += order;
                }
                Ok(())
            };
            match &mut lowered {
                Lowered::Scalar(terms) => add_order(terms)?,
                Lowered::Vector(components) => components.iter_mut().try_for_each(add_order)?,
            }
            Ok(lowered)
        }
        Expr::Scale(factor, expr) => {
            let mut lowered = lower(expr, leaf)?;
            let scale = |terms: &mut Vec<Term>| terms.iter_mut().for_each(|t| t.coefficient *= factor);
            match &mut lowered {
                Lowered::Scalar(terms) => scale(terms),
                Lowered::Vector(components) => components.iter_mut().for_each(scale),
            }
            Ok(lowered)
        }
        Expr::Sum(exprs) => {
            let mut sum: Option<Lowered> = None;
            for expr in exprs {
                let lowered = lower(expr, leaf)?;
                sum = Some(match (sum, lowered) {
                    (None, lowered) => lowered,
                    (Some(Lowered::Scalar(mut a)), Lowered::Scalar(b)) => {
                        a.extend(b);
                        Lowered::Scalar(a)
                    }
                    (Some(Lowered::Vector(mut a)), Lowered::Vector(b)) if a.len() == b.len() => {
                        a.iter_mut().zip(b).for_each(|(a, b)| a.extend(b));
                        Lowered::Vector(a)
                    }
                    _ => return Err(Error::unsupported("sum of expressions with different ranks")),
                });
            }
            Ok(sum.unwrap_or(Lowered::Scalar(Vec::new())))
        }
        Expr::Vector(exprs) => {
            let mut components = Vec::with_capacity(exprs.len());
            for expr in exprs {
                match lower(expr, leaf)? {
                    Lowered::Scalar(terms) => components.push(terms),
                    Lowered::Vector(_) => return Err(Error::unsupported("vectors of vector expressions")),
                }
            }
            Ok(Lowered::Vector(components))
        }
        Expr::Div(expr) => match lower(expr, leaf)? {
            Lowered::Vector(components) => {
                let mut terms = Vec::new();
                for (axis, component) in components.into_iter().enumerate() {
                    for mut term in component {
                        let entry = term
                            .orders
                            .get_mut(axis)
                            .ok_or_else(|| Error::configuration("divergence of a vector with too many components"))?;
                        *entry += 1;
                        terms.push(term);
                    }
                }
                Ok(Lowered::Scalar(terms))
            }
            Lowered::Scalar(_) => Err(Error::unsupported("divergence of a scalar expression")),
        },
    }
}

fn lower_role(expr: &Expr, role: Role) -> Result<(Lowered, Arc<TensorProductSpace>)> {
    let mut leaf = None;
    let lowered = lower(expr, &mut leaf)?;
    match leaf {
        Some(leaf) if leaf.role == role => Ok((lowered, leaf.space)),
        _ => Err(Error::unsupported(format!("expected an expression in the {role:?} function"))),
    }
}

/// Assembles the bilinear form `(trial, test)` as a sum of separable tensor-product terms.
///
/// Terms with identical derivative orders are merged, and terms whose coefficients cancel are
/// dropped. Derivatives are taken with respect to the physical coordinates, while the integrals
/// themselves are taken over the reference domains.
pub fn inner(test: impl Into<Expr>, trial: impl Into<Expr>) -> Result<Vec<TPMatrix>> {
    let (test, test_space) = lower_role(&test.into(), Role::Test)?;
    let (trial, trial_space) = lower_role(&trial.into(), Role::Trial)?;
    if test_space.dim() != trial_space.dim() {
        return Err(Error::configuration(format!(
            "test space is {}-dimensional but trial space is {}-dimensional",
            test_space.dim(),
            trial_space.dim()
        )));
    }

    let pairs: Vec<(&Term, &Term)> = match (&test, &trial) {
        (Lowered::Scalar(v), Lowered::Scalar(u)) => v.iter().flat_map(|a| u.iter().map(move |b| (a, b))).collect(),
        (Lowered::Vector(v), Lowered::Vector(u)) if v.len() == u.len() => v
            .iter()
            .zip(u)
            .flat_map(|(v, u)| v.iter().flat_map(move |a| u.iter().map(move |b| (a, b))))
            .collect(),
        _ => return Err(Error::unsupported("inner product of expressions with different ranks")),
    };

    let mut merged: Vec<(Vec<(usize, usize)>, f64)> = Vec::new();
    for (v, u) in pairs {
        let orders: Vec<_> = v.orders.iter().copied().zip(u.orders.iter().copied()).collect();
        let coefficient = v.coefficient * u.coefficient;
        match merged.iter_mut().find(|(existing, _)| *existing == orders) {
            Some((_, scale)) => *scale += coefficient,
            None => merged.push((orders, coefficient)),
        }
    }

    let mut result = Vec::new();
    for (orders, coefficient) in merged.into_iter().filter(|(_, c)| *c != 0.0) {
        let mut matrices = Vec::with_capacity(orders.len());
        for (axis, &(p, q)) in orders.iter().enumerate() {
            let test_basis = test_space.basis(axis);
            let trial_basis = trial_space.basis(axis);
            matrices.push(
                trial_space
                    .matrices()
                    .get_or_assemble(test_basis, trial_basis, p, q)?,
            );
        }
        result.push(TPMatrix::new(coefficient, matrices));
    }
    Ok(result)
}

/// The right-hand side `(f, v)` for values `f` at the quadrature points.
///
/// The rows of boundary functions are zero.
pub fn inner_array(test: impl Into<Expr>, f: &Array) -> Result<Function> {
    let test = test.into();
    let (_, space) = rhs_scale(&test)?;
    let mut output = Function::zeros(&space);
    inner_array_into(test, f, &mut output)?;
    Ok(output)
}

/// Like [`inner_array`], writing into existing coefficients of the test space.
pub fn inner_array_into(test: impl Into<Expr>, f: &Array, output: &mut Function) -> Result<()> {
    let (coefficient, space) = rhs_scale(&test.into())?;
    space.scalar_product(f, output)?;
    if coefficient != 1.0 {
        output.data_mut().mapv_inplace(|z| z * Complex64::new(coefficient, 0.0));
    }
    Ok(())
}

/// The scale of an undifferentiated test function, and its space.
fn rhs_scale(test: &Expr) -> Result<(f64, Arc<TensorProductSpace>)> {
    let (test, space) = lower_role(test, Role::Test)?;
    match test {
        Lowered::Scalar(terms) if terms.iter().all(|t| t.orders.iter().all(|&o| o == 0)) => {
            Ok((terms.iter().map(|t| t.coefficient).sum::<f64>(), space))
        }
        _ => Err(Error::unsupported(
            "the right-hand side only supports undifferentiated test functions",
        )),
    }
}
