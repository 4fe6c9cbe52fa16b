use faer::{Col, ColMut, ColRef, unzip, zip};

use crate::{ElementType, I, cast};

pub fn fill<T: ElementType>(x: ColMut<'_, T>, v: T) {
    zip!(x).for_each(|unzip!(x)| *x = v);
}

pub fn copy_into<T: ElementType>(dst: ColMut<'_, T>, src: ColRef<'_, T>) {
    zip!(dst, src).for_each(|unzip!(dst, src)| *dst = *src);
}

/// `y <- y + a * x`
pub fn axpy<T: ElementType>(y: ColMut<'_, T>, a: T, x: ColRef<'_, T>) {
    zip!(y, x).for_each(|unzip!(y, x)| *y = *y + a * *x);
}

pub fn scale<T: ElementType>(x: ColMut<'_, T>, a: T) {
    zip!(x).for_each(|unzip!(x)| *x = a * *x);
}

pub fn cwise_multiply<T: ElementType>(x1: ColRef<'_, T>, x2: ColRef<'_, T>) -> Col<T> {
    let mut out = Col::<T>::zeros(x1.nrows());

    zip!(x1, x2, out.as_mut()).for_each(|unzip!(x1, x2, out)| *out = *x1 * *x2);

    out
}

pub fn cwise_quotient<T: ElementType>(x1: ColRef<'_, T>, x2: ColRef<'_, T>) -> Col<T> {
    let mut out = Col::<T>::zeros(x1.nrows());

    zip!(x1, x2, out.as_mut()).for_each(|unzip!(x1, x2, out)| *out = *x1 / *x2);

    out
}

pub fn cwise_inverse<T: ElementType>(x: ColRef<'_, T>) -> Col<T> {
    let mut out = Col::<T>::zeros(x.nrows());

    zip!(x, out.as_mut()).for_each(|unzip!(x, out)| *out = T::one() / *x);

    out
}

pub fn cwise_max<T: ElementType>(x1: ColRef<'_, T>, x2: ColRef<'_, T>) -> Col<T> {
    let mut out = Col::<T>::zeros(x1.nrows());

    zip!(x1, x2, out.as_mut()).for_each(|unzip!(x1, x2, out)| *out = T::max(*x1, *x2));

    out
}

pub fn cwise_min<T: ElementType>(x1: ColRef<'_, T>, x2: ColRef<'_, T>) -> Col<T> {
    let mut out = Col::<T>::zeros(x1.nrows());

    zip!(x1, x2, out.as_mut()).for_each(|unzip!(x1, x2, out)| *out = T::min(*x1, *x2));

    out
}

pub fn dot<T: ElementType>(x1: ColRef<'_, T>, x2: ColRef<'_, T>) -> T {
    let mut acc = T::zero();

    zip!(x1, x2).for_each(|unzip!(x1, x2)| acc = acc + *x1 * *x2);

    acc
}

pub fn norm_l1<T: ElementType>(x: ColRef<'_, T>) -> T {
    let mut acc = T::zero();

    zip!(x).for_each(|unzip!(x)| acc = acc + (*x).abs());

    acc
}

pub fn norm_l2<T: ElementType>(x: ColRef<'_, T>) -> T {
    dot(x, x).sqrt()
}

pub fn norm_linf<T: ElementType>(x: ColRef<'_, T>) -> T {
    let mut acc = T::zero();

    zip!(x).for_each(|unzip!(x)| acc = T::max(acc, (*x).abs()));

    acc
}

/// Sum of `|x_k|` over the half-open range `[begin, end)`.
pub fn sum_abs_range<T: ElementType>(x: ColRef<'_, T>, begin: I, end: I) -> T {
    norm_l1(x.subrows(begin, end - begin))
}

/// Euclidean norm of `x` restricted to `[begin, end)`.
pub fn norm_l2_range<T: ElementType>(x: ColRef<'_, T>, begin: I, end: I) -> T {
    norm_l2(x.subrows(begin, end - begin))
}

/// Copies a host array into a column of the active scalar type.
pub fn from_host<T: ElementType>(data: &[f64]) -> Col<T> {
    Col::from_fn(data.len(), |i| cast(data[i]))
}

/// Copies a column back into host (64-bit) memory.
pub fn to_host<T: ElementType>(x: ColRef<'_, T>) -> Vec<f64> {
    (0..x.nrows()).map(|i| x[i].to_f64().unwrap_or(f64::NAN)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::E;

    #[test]
    fn test_cwise_quotient() {
        let x1_data = [1.0, 2.0, 3.0];
        let x2_data = [4.0, 5.0, 6.0];
        let x1 = Col::from_fn(x1_data.len(), |i| x1_data[i]);
        let x2 = Col::from_fn(x2_data.len(), |i| x2_data[i]);
        let result = cwise_quotient(x1.as_ref(), x2.as_ref());
        let expected = [0.25, 0.4, 0.5];
        let expected_col = Col::from_fn(expected.len(), |i| expected[i]);
        assert_eq!(result, expected_col);
    }

    #[test]
    fn test_axpy() {
        let mut y = Col::<E>::from_fn(3, |i| i as E);
        let x = Col::<E>::ones(3);
        axpy(y.as_mut(), 2.0, x.as_ref());
        assert_eq!(y, Col::<E>::from_fn(3, |i| i as E + 2.0));
    }

    #[test]
    fn test_norms() {
        let x = Col::<E>::from_fn(4, |i| if i % 2 == 0 { -1.0 } else { 2.0 });
        assert_eq!(norm_l1(x.as_ref()), 6.0);
        assert_eq!(norm_l2(x.as_ref()), 10.0f64.sqrt());
        assert_eq!(norm_linf(x.as_ref()), 2.0);
        assert_eq!(sum_abs_range(x.as_ref(), 1, 3), 3.0);
    }

    #[test]
    fn test_host_round_trip() {
        let data = [0.5, -1.5, 3.0];
        let x = from_host::<f32>(&data);
        assert_eq!(to_host(x.as_ref()), vec![0.5, -1.5, 3.0]);
    }
}
