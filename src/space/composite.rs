//! Spaces with several components on a shared grid, e.g. vector fields or coupled systems.
use super::TensorProductSpace;
use crate::array::{Array, Function};
use crate::error::{Error, Result};
use ndarray::{ArrayD, ArrayViewD, Axis};
use num::complex::Complex64;
use std::sync::Arc;

/// A product of tensor-product spaces, one per component.
///
/// All components share the communicator and the physical grid, so their physical data can be
/// stacked along a leading component axis. The bases may differ between components, e.g. in
/// their boundary conditions.
#[derive(Debug, Clone)]
pub struct CompositeSpace {
    spaces: Vec<Arc<TensorProductSpace>>,
}

impl CompositeSpace {
    pub fn new(spaces: Vec<Arc<TensorProductSpace>>) -> Result<Self> {
        let first = spaces
            .first()
            .ok_or_else(|| Error::configuration("a composite space needs at least one component"))?;
        for (i, space) in spaces.iter().enumerate().skip(1) {
            if space.dim() != first.dim() {
                return Err(Error::configuration(format!(
                    "component {i} is {}-dimensional, component 0 is {}-dimensional",
                    space.dim(),
                    first.dim()
                )));
            }
            if space.global_shape(false) != first.global_shape(false) {
                return Err(Error::shape(&first.global_shape(false), &space.global_shape(false)));
            }
            let same_ranks = space.comm().size() == first.comm().size() && space.comm().rank() == first.comm().rank();
            if !same_ranks || space.local_slice(false) != first.local_slice(false) {
                return Err(Error::configuration(format!(
                    "component {i} does not share the communicator and decomposition of component 0"
                )));
            }
        }
        Ok(Self { spaces })
    }

    /// One component per axis of `space`.
    pub fn vector(space: &Arc<TensorProductSpace>) -> Self {
        Self {
            spaces: vec![Arc::clone(space); space.dim()],
        }
    }

    pub fn num_components(&self) -> usize {
        self.spaces.len()
    }

    pub fn component(&self, i: usize) -> &Arc<TensorProductSpace> {
        &self.spaces[i]
    }

    pub fn components(&self) -> &[Arc<TensorProductSpace>] {
        &self.spaces
    }

    /// Transforms every component to expansion coefficients.
    pub fn forward(&self, input: &CompositeArray, output: &mut CompositeFunction) -> Result<()> {
        self.check_components(input.components.len())?;
        self.check_components(output.components.len())?;
        for ((space, values), coefficients) in self.spaces.iter().zip(&input.components).zip(&mut output.components) {
            space.forward(values, coefficients)?;
        }
        Ok(())
    }

    /// Evaluates every component at the quadrature points.
    pub fn backward(&self, input: &CompositeFunction, output: &mut CompositeArray) -> Result<()> {
        self.check_components(input.components.len())?;
        self.check_components(output.components.len())?;
        for ((space, coefficients), values) in self.spaces.iter().zip(&input.components).zip(&mut output.components) {
            space.backward(coefficients, values)?;
        }
        Ok(())
    }

    /// The weighted inner products of every component with the test functions of its space.
    pub fn scalar_product(&self, input: &CompositeArray, output: &mut CompositeFunction) -> Result<()> {
        self.check_components(input.components.len())?;
        self.check_components(output.components.len())?;
        for ((space, values), coefficients) in self.spaces.iter().zip(&input.components).zip(&mut output.components) {
            space.scalar_product(values, coefficients)?;
        }
        Ok(())
    }

    fn check_components(&self, count: usize) -> Result<()> {
        if count != self.spaces.len() {
            return Err(Error::shape(&[self.spaces.len()], &[count]));
        }
        Ok(())
    }
}

/// Physical values of every component of a [`CompositeSpace`].
#[derive(Debug, Clone)]
pub struct CompositeArray {
    space: CompositeSpace,
    components: Vec<Array>,
}

impl CompositeArray {
    pub fn zeros(space: &CompositeSpace) -> Self {
        Self {
            space: space.clone(),
            components: space.spaces.iter().map(Array::zeros).collect(),
        }
    }

    /// Collects existing arrays, which must belong to the components of `space` in order.
    pub fn from_components(space: &CompositeSpace, components: Vec<Array>) -> Result<Self> {
        space.check_components(components.len())?;
        for (component, array) in space.spaces.iter().zip(&components) {
            component.check_shape(false, array.data().shape())?;
        }
        Ok(Self {
            space: space.clone(),
            components,
        })
    }

    pub fn space(&self) -> &CompositeSpace {
        &self.space
    }

    pub fn component(&self, i: usize) -> &Array {
        &self.components[i]
    }

    pub fn component_mut(&mut self, i: usize) -> &mut Array {
        &mut self.components[i]
    }

    pub fn components(&self) -> &[Array] {
        &self.components
    }

    pub fn forward(&self) -> Result<CompositeFunction> {
        let mut output = CompositeFunction::zeros(&self.space);
        self.space.forward(self, &mut output)?;
        Ok(output)
    }

    /// The local data of all components, stacked along a new leading axis.
    pub fn stacked(&self) -> Result<ArrayD<f64>> {
        let views: Vec<ArrayViewD<'_, f64>> = self.components.iter().map(|c| c.data().view()).collect();
        stack(&views)
    }
}

/// Expansion coefficients of every component of a [`CompositeSpace`].
#[derive(Debug, Clone)]
pub struct CompositeFunction {
    space: CompositeSpace,
    components: Vec<Function>,
}

impl CompositeFunction {
    pub fn zeros(space: &CompositeSpace) -> Self {
        Self {
            space: space.clone(),
            components: space.spaces.iter().map(Function::zeros).collect(),
        }
    }

    pub fn from_components(space: &CompositeSpace, components: Vec<Function>) -> Result<Self> {
        space.check_components(components.len())?;
        for (component, function) in space.spaces.iter().zip(&components) {
            component.check_shape(true, function.data().shape())?;
        }
        Ok(Self {
            space: space.clone(),
            components,
        })
    }

    pub fn space(&self) -> &CompositeSpace {
        &self.space
    }

    pub fn component(&self, i: usize) -> &Function {
        &self.components[i]
    }

    pub fn component_mut(&mut self, i: usize) -> &mut Function {
        &mut self.components[i]
    }

    pub fn components(&self) -> &[Function] {
        &self.components
    }

    pub fn backward(&self) -> Result<CompositeArray> {
        let mut output = CompositeArray::zeros(&self.space);
        self.space.backward(self, &mut output)?;
        Ok(output)
    }

    /// The local coefficients of all components, stacked along a new leading axis.
    ///
    /// Fails with a shape error if the components have different spectral shapes.
    pub fn stacked(&self) -> Result<ArrayD<Complex64>> {
        let views: Vec<ArrayViewD<'_, Complex64>> = self.components.iter().map(|c| c.data().view()).collect();
        stack(&views)
    }
}

fn stack<T: Clone>(views: &[ArrayViewD<'_, T>]) -> Result<ArrayD<T>> {
    ndarray::stack(Axis(0), views).map_err(|_| {
        let expected = views.first().map(|v| v.shape().to_vec()).unwrap_or_default();
        let actual = views
            .iter()
            .map(|v| v.shape())
            .find(|shape| *shape != expected.as_slice())
            .map(<[usize]>::to_vec)
            .unwrap_or_default();
        Error::shape(&expected, &actual)
    })
}
