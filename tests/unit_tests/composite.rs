use crate::run_on_ranks;
use galerkin::array::Array;
use galerkin::basis::{Basis, BoundaryCondition, Dtype, Family};
use galerkin::error::Error;
use galerkin::space::{CompositeArray, CompositeFunction, CompositeSpace, DecompositionKind, TensorProductSpace};
use std::sync::Arc;

fn chebyshev(n: usize, bc: BoundaryCondition) -> Basis {
    Basis::builder(n, Family::Chebyshev).with_bc(bc).build().unwrap()
}

fn max_abs(data: impl IntoIterator<Item = f64>) -> f64 {
    data.into_iter().fold(0.0, |m, x| m.max(x.abs()))
}

#[test]
fn vector_fields_transform_componentwise() {
    let space = TensorProductSpace::serial(vec![
        chebyshev(12, BoundaryCondition::dirichlet(0.0, 0.0)),
        Basis::fourier(8).unwrap(),
    ])
    .unwrap();
    let vector = CompositeSpace::vector(&space);
    assert_eq!(vector.num_components(), 2);

    let fields: [fn(&[f64]) -> f64; 2] = [
        |x| (1.0 - x[0] * x[0]) * x[1].cos(),
        |x| (1.0 - x[0] * x[0]) * x[0] * (2.0 * x[1]).sin(),
    ];
    let values = fields.iter().map(|f| Array::from_fn(&space, f)).collect();
    let values = CompositeArray::from_components(&vector, values).unwrap();
    let coefficients = values.forward().unwrap();
    for (i, f) in fields.iter().enumerate() {
        let expected = Array::from_fn(&space, f).forward().unwrap();
        assert_eq!(coefficients.component(i).data(), expected.data());
    }

    let recovered = coefficients.backward().unwrap();
    let stacked = recovered.stacked().unwrap();
    assert_eq!(stacked.shape(), &[2, 12, 8]);
    let difference = &stacked - &values.stacked().unwrap();
    assert!(max_abs(difference) < 1e-13);
    assert_eq!(coefficients.stacked().unwrap().shape(), &[2, 12, 5]);
}

#[test]
fn mixed_spaces_take_different_bases_per_component() {
    let complex = || Basis::builder(8, Family::Fourier).with_dtype(Dtype::Complex).build().unwrap();
    let velocity = TensorProductSpace::serial(vec![chebyshev(12, BoundaryCondition::dirichlet(1.0, 2.0)), complex()]).unwrap();
    let pressure = TensorProductSpace::serial(vec![chebyshev(12, BoundaryCondition::neumann(0.0, 0.0)), complex()]).unwrap();
    let real = TensorProductSpace::serial(vec![chebyshev(12, BoundaryCondition::none()), Basis::fourier(8).unwrap()]).unwrap();
    let mixed = CompositeSpace::new(vec![velocity, pressure, real]).unwrap();

    // Each field lies in the space of its component
    let fields: [fn(&[f64]) -> f64; 3] = [
        |x| 1.5 + 0.5 * x[0] + (1.0 - x[0] * x[0]) * x[0] * x[1].cos(),
        |x| 1.0 + (x[0] * x[0] - 0.5 * x[0].powi(4)) * x[1].cos(),
        |x| x[0].powi(3) + x[0] * x[1].sin(),
    ];
    let mut values = CompositeArray::zeros(&mixed);
    for (i, f) in fields.iter().enumerate() {
        let space = Arc::clone(mixed.component(i));
        *values.component_mut(i) = Array::from_fn(&space, f);
    }
    let mut coefficients = CompositeFunction::zeros(&mixed);
    mixed.forward(&values, &mut coefficients).unwrap();
    // Only the first component carries inhomogeneous boundary values
    assert_eq!(coefficients.component(0).data()[[10, 0]].re, 1.0);
    assert_eq!(coefficients.component(0).data()[[11, 0]].re, 2.0);

    let mut recovered = CompositeArray::zeros(&mixed);
    mixed.backward(&coefficients, &mut recovered).unwrap();
    assert!(max_abs(&recovered.stacked().unwrap() - &values.stacked().unwrap()) < 1e-12);

    // The real-to-complex component has fewer spectral coefficients
    assert!(matches!(coefficients.stacked(), Err(Error::Shape { .. })));
    let too_few = CompositeFunction::from_components(&mixed, Vec::new());
    assert!(matches!(too_few, Err(Error::Shape { .. })));
}

#[test]
fn components_must_share_the_grid() {
    let fourier = || Basis::fourier(8).unwrap();
    let coarse = TensorProductSpace::serial(vec![Basis::chebyshev(10).unwrap(), fourier()]).unwrap();
    let fine = TensorProductSpace::serial(vec![Basis::chebyshev(12).unwrap(), fourier()]).unwrap();
    assert!(matches!(CompositeSpace::new(vec![coarse.clone(), fine]), Err(Error::Shape { .. })));
    assert!(matches!(CompositeSpace::new(Vec::new()), Err(Error::Configuration(_))));

    let line = TensorProductSpace::serial(vec![Basis::chebyshev(10).unwrap()]).unwrap();
    assert!(matches!(CompositeSpace::new(vec![coarse, line]), Err(Error::Configuration(_))));

    run_on_ranks(4, |comm| {
        let bases = || {
            vec![
                Basis::chebyshev(8).unwrap(),
                Basis::builder(8, Family::Fourier).with_dtype(Dtype::Complex).build().unwrap(),
                fourier(),
            ]
        };
        let slabs = TensorProductSpace::with_axes(Arc::clone(&comm), bases(), vec![0, 1, 2], DecompositionKind::Slab).unwrap();
        let pencils = TensorProductSpace::with_axes(comm, bases(), vec![0, 1, 2], DecompositionKind::Pencil).unwrap();
        assert!(CompositeSpace::new(vec![slabs.clone(), slabs.clone()]).is_ok());
        assert!(matches!(CompositeSpace::new(vec![slabs, pencils]), Err(Error::Configuration(_))));
    });
}
