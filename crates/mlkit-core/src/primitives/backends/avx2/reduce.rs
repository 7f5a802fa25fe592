//! AVX2 reductions for f32 and f64, generated from one template

use std::arch::x86_64::*;

/// Element types with AVX2 reductions
pub trait Avx2Reduce: Copy {
    /// Elements per 256-bit register
    const AVX2_LANES: usize;

    /// # Safety
    /// The CPU must support AVX2.
    unsafe fn reduce_sum(data: &[Self]) -> Self;

    /// # Safety
    /// The CPU must support AVX2 and FMA.
    unsafe fn reduce_dot(a: &[Self], b: &[Self]) -> Self;

    /// # Safety
    /// The CPU must support AVX2 and FMA.
    unsafe fn reduce_squared_distance(a: &[Self], b: &[Self]) -> Self;
}

#[inline]
#[target_feature(enable = "avx2")]
unsafe fn reduce_pd(v: __m256d) -> f64 {
    let pair = _mm_add_pd(_mm256_castpd256_pd128(v), _mm256_extractf128_pd(v, 1));
    _mm_cvtsd_f64(_mm_add_sd(pair, _mm_unpackhi_pd(pair, pair)))
}

#[inline]
#[target_feature(enable = "avx2")]
unsafe fn reduce_ps(v: __m256) -> f32 {
    let quad = _mm_add_ps(_mm256_castps256_ps128(v), _mm256_extractf128_ps(v, 1));
    let pair = _mm_add_ps(quad, _mm_movehl_ps(quad, quad));
    _mm_cvtss_f32(_mm_add_ss(pair, _mm_movehdup_ps(pair)))
}

macro_rules! avx2_reduce {
    (
        $t:ty, $lanes:expr, $reduce:ident,
        zero: $zero:ident, load: $load:ident, add: $add:ident, sub: $sub:ident, fmadd: $fmadd:ident,
        fns: ($sum:ident, $dot:ident, $dist:ident)
    ) => {
        #[target_feature(enable = "avx2")]
        unsafe fn $sum(data: &[$t]) -> $t {
            let mut chunks = data.chunks_exact($lanes);
            let mut acc = $zero();
            for chunk in &mut chunks {
                acc = $add(acc, $load(chunk.as_ptr()));
            }
            chunks.remainder().iter().fold($reduce(acc), |s, &x| s + x)
        }

        #[target_feature(enable = "avx2", enable = "fma")]
        unsafe fn $dot(a: &[$t], b: &[$t]) -> $t {
            let n = a.len().min(b.len());
            let (a, b) = (&a[..n], &b[..n]);
            let mut acc = $zero();
            for (x, y) in a.chunks_exact($lanes).zip(b.chunks_exact($lanes)) {
                acc = $fmadd($load(x.as_ptr()), $load(y.as_ptr()), acc);
            }
            let tail = n - n % $lanes;
            a[tail..].iter().zip(&b[tail..]).fold($reduce(acc), |s, (&x, &y)| s + x * y)
        }

        #[target_feature(enable = "avx2", enable = "fma")]
        unsafe fn $dist(a: &[$t], b: &[$t]) -> $t {
            let n = a.len().min(b.len());
            let (a, b) = (&a[..n], &b[..n]);
            let mut acc = $zero();
            for (x, y) in a.chunks_exact($lanes).zip(b.chunks_exact($lanes)) {
                let d = $sub($load(x.as_ptr()), $load(y.as_ptr()));
                acc = $fmadd(d, d, acc);
            }
            let tail = n - n % $lanes;
            a[tail..].iter().zip(&b[tail..]).fold($reduce(acc), |s, (&x, &y)| {
                let d = x - y;
                s + d * d
            })
        }

        impl Avx2Reduce for $t {
            const AVX2_LANES: usize = $lanes;

            unsafe fn reduce_sum(data: &[$t]) -> $t {
                $sum(data)
            }

            unsafe fn reduce_dot(a: &[$t], b: &[$t]) -> $t {
                $dot(a, b)
            }

            unsafe fn reduce_squared_distance(a: &[$t], b: &[$t]) -> $t {
                $dist(a, b)
            }
        }
    };
}

avx2_reduce!(
    f32, 8, reduce_ps,
    zero: _mm256_setzero_ps, load: _mm256_loadu_ps, add: _mm256_add_ps, sub: _mm256_sub_ps, fmadd: _mm256_fmadd_ps,
    fns: (sum_f32, dot_f32, squared_distance_f32)
);

avx2_reduce!(
    f64, 4, reduce_pd,
    zero: _mm256_setzero_pd, load: _mm256_loadu_pd, add: _mm256_add_pd, sub: _mm256_sub_pd, fmadd: _mm256_fmadd_pd,
    fns: (sum_f64, dot_f64, squared_distance_f64)
);
