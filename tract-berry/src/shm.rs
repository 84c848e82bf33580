//! 实对称球谐 (spherical harmonics) 基.
//!
//! 采用 Descoteaux 2007 的实对称基 (只含偶数阶), 系数排列顺序为
//! `l = 0, 2, 4, ...`, 每阶内 `m = -l..=l`. 对于 `Y_l^m = N P_l^|m|(cos θ) e^{i|m|φ}`
//! (含 Condon-Shortley 相位):
//!
//! - `m < 0`: `sqrt(2) * Re(Y_l^|m|)`
//! - `m = 0`: `Y_l^0`
//! - `m > 0`: `sqrt(2) * Im(Y_l^|m|)`

use ndarray::Array2;

use crate::sphere::Sphere;

/// `order` 阶 (偶数) 实对称球谐基的系数个数.
#[inline]
pub const fn n_coefficients(order: u32) -> usize {
    let l = order as usize;
    (l + 1) * (l + 2) / 2
}

/// 根据系数个数反推球谐阶数. 不对应任何偶数阶时返回 `None`.
pub fn order_from_coefficients(n: usize) -> Option<u32> {
    (0..=64u32)
        .step_by(2)
        .take_while(|&l| n_coefficients(l) <= n)
        .find(|&l| n_coefficients(l) == n)
}

/// 带 Condon-Shortley 相位的连带勒让德函数 `P_l^m(x)`, 要求 `0 <= m <= l`.
fn legendre(l: u32, m: u32, x: f64) -> f64 {
    debug_assert!(m <= l);
    let mut pmm = 1.0;
    if m > 0 {
        let somx2 = ((1.0 - x) * (1.0 + x)).max(0.0).sqrt();
        let mut fact = 1.0;
        for _ in 0..m {
            pmm *= -fact * somx2;
            fact += 2.0;
        }
    }
    if l == m {
        return pmm;
    }
    let mut pmmp1 = x * (2 * m + 1) as f64 * pmm;
    if l == m + 1 {
        return pmmp1;
    }
    let mut pll = 0.0;
    for ll in (m + 2)..=l {
        pll = (x * (2 * ll - 1) as f64 * pmmp1 - (ll + m - 1) as f64 * pmm) / (ll - m) as f64;
        pmm = pmmp1;
        pmmp1 = pll;
    }
    pll
}

/// 球谐归一化系数 `sqrt((2l + 1) / 4π * (l - m)! / (l + m)!)`.
fn normalization(l: u32, m: u32) -> f64 {
    let ratio: f64 = ((l - m + 1)..=(l + m)).map(|k| 1.0 / k as f64).product();
    ((2 * l + 1) as f64 / (4.0 * std::f64::consts::PI) * ratio).sqrt()
}

/// 在球坐标 `(theta, phi)` 处求 `order` 阶实对称球谐基的全部取值.
pub fn real_sym_sh(order: u32, theta: f64, phi: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(n_coefficients(order));
    let x = theta.cos();
    for l in (0..=order).step_by(2) {
        for m in -(l as i32)..=(l as i32) {
            let am = m.unsigned_abs();
            let base = normalization(l, am) * legendre(l, am, x);
            let v = match m {
                0 => base,
                m if m < 0 => std::f64::consts::SQRT_2 * base * (am as f64 * phi).cos(),
                _ => std::f64::consts::SQRT_2 * base * (am as f64 * phi).sin(),
            };
            out.push(v);
        }
    }
    out
}

/// 球谐基在离散球面上的取值矩阵 `B`, 形状为 `(顶点数, 系数个数)`.
///
/// 对于某体素的系数向量 `c`, 该体素在球面上的分布为 `B c`.
#[derive(Debug, Clone)]
pub struct ShBasis {
    order: u32,
    matrix: Array2<f64>,
}

impl ShBasis {
    /// 在球面 `sphere` 上构建 `order` 阶 (偶数) 基矩阵.
    ///
    /// `order` 为奇数时 panic.
    pub fn new(order: u32, sphere: &Sphere) -> Self {
        assert_eq!(order % 2, 0, "实对称球谐基只有偶数阶");
        let coords = sphere.spherical_coords();
        let mut matrix = Array2::zeros((coords.len(), n_coefficients(order)));
        for (mut row, (theta, phi)) in matrix.rows_mut().into_iter().zip(coords) {
            for (dst, v) in row.iter_mut().zip(real_sym_sh(order, theta, phi)) {
                *dst = v;
            }
        }
        Self { order, matrix }
    }

    /// 球谐阶数.
    #[inline]
    pub fn order(&self) -> u32 {
        self.order
    }

    /// 基矩阵.
    #[inline]
    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    /// 由系数 `coeffs` 求球面上的分布, 结果写入 `out` (长度为顶点数).
    pub fn evaluate(&self, coeffs: &[f64], out: &mut [f64]) {
        debug_assert_eq!(coeffs.len(), self.matrix.ncols());
        debug_assert_eq!(out.len(), self.matrix.nrows());
        for (o, row) in out.iter_mut().zip(self.matrix.rows()) {
            *o = row.iter().zip(coeffs).map(|(b, c)| b * c).sum();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-10
    }

    #[test]
    fn test_order_from_coefficients() {
        assert_eq!(order_from_coefficients(1), Some(0));
        assert_eq!(order_from_coefficients(6), Some(2));
        assert_eq!(order_from_coefficients(15), Some(4));
        assert_eq!(order_from_coefficients(45), Some(8));
        assert_eq!(order_from_coefficients(2), None);
        assert_eq!(order_from_coefficients(0), None);
        assert_eq!(order_from_coefficients(44), None);
    }

    #[test]
    fn test_legendre_known_values() {
        let x = 0.3;
        assert!(f64_eq(legendre(2, 0, x), 0.5 * (3.0 * x * x - 1.0)));
        // P_1^1(x) = -sqrt(1 - x^2) (Condon-Shortley).
        assert!(f64_eq(legendre(1, 1, x), -(1.0 - x * x).sqrt()));
        assert!(f64_eq(legendre(2, 2, x), 3.0 * (1.0 - x * x)));
        assert!(f64_eq(legendre(4, 0, 1.0), 1.0));
    }

    #[test]
    fn test_constant_term() {
        let v = real_sym_sh(4, 1.1, -0.3);
        assert_eq!(v.len(), 15);
        assert!(f64_eq(v[0], 0.5 / PI.sqrt()));
    }

    #[test]
    fn test_basis_is_antipodally_symmetric() {
        let sphere = Sphere::symmetric_fibonacci(20);
        let basis = ShBasis::new(6, &sphere);
        let b = basis.matrix();
        for i in 0..20 {
            for c in 0..b.ncols() {
                assert!((b[(i, c)] - b[(i + 20, c)]).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_basis_is_orthonormal_on_dense_sphere() {
        // 在近似均匀的稠密球面上, 基函数的内积 ≈ 单位阵 * (顶点数 / 4π).
        let sphere = Sphere::symmetric_fibonacci(4000);
        let basis = ShBasis::new(4, &sphere);
        let b = basis.matrix();
        let gram = b.t().dot(b) * (4.0 * PI / sphere.len() as f64);
        for i in 0..gram.nrows() {
            for j in 0..gram.ncols() {
                let want = if i == j { 1.0 } else { 0.0 };
                assert!((gram[(i, j)] - want).abs() < 1e-2, "({i}, {j}) = {}", gram[(i, j)]);
            }
        }
    }

    #[test]
    fn test_evaluate_isotropic() {
        let sphere = Sphere::symmetric_fibonacci(10);
        let basis = ShBasis::new(2, &sphere);
        let mut coeffs = vec![0.0; 6];
        coeffs[0] = 2.0 * PI.sqrt();
        let mut out = vec![0.0; 20];
        basis.evaluate(&coeffs, &mut out);
        assert!(out.iter().all(|v| f64_eq(*v, 1.0)));
    }
}
