//! The shared parameter matrices.
//!
//! Every training thread reads and writes these concurrently without locks.
//! Each element is a [`Real`], a relaxed atomic load/store cell: reads and
//! writes of one element never tear, but `add` is a plain read followed by a
//! write, so concurrent updates to the same element can be lost. That is the
//! asynchronous SGD contract the trainer relies on.

use std::sync::atomic::{AtomicU32, Ordering};

use aligned_box::AlignedBox;
use anyhow::{anyhow, Result};

use crate::config::ModelType;
use crate::{real, Rng};

#[derive(Default)]
#[repr(transparent)]
pub struct Real {
    bits: AtomicU32,
}

impl Real {
    pub fn get(&self) -> real {
        real::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn set(&self, value: real) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn add(&self, x: real) {
        let a = self.get();
        self.set(a + x);
    }
}

/// Dot product of two rows.
pub fn dot(a: &[Real], b: &[Real]) -> real {
    assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(a, b)| a.get() * b.get()).sum()
}

/// A `rows x dim` matrix, row-major, 128-byte aligned.
pub struct Matrix {
    dim: usize,
    data: AlignedBox<[Real]>,
}

impl Matrix {
    pub fn zeros(rows: usize, dim: usize) -> Result<Self> {
        let len = rows
            .checked_mul(dim)
            .ok_or_else(|| anyhow!("memory allocation failed: {rows} x {dim} is too large"))?;
        let data = AlignedBox::slice_from_default(128, len)
            .map_err(|err| anyhow!("memory allocation failed: {err}"))?;
        Ok(Matrix { dim, data })
    }

    pub fn rows(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// `row(k)` is the vector for word `k`. Panics if `k` is out of range.
    pub fn row(&self, k: usize) -> &[Real] {
        &self.data[k * self.dim..][..self.dim]
    }

    /// Copies the current values. Other threads may be writing meanwhile;
    /// the copy is whatever each element held when it was read.
    pub fn snapshot(&self) -> Vec<real> {
        self.data.iter().map(Real::get).collect()
    }
}

fn random_init(m: &Matrix, rng: &mut Rng) {
    let dim = m.dim as real;
    for e in m.data.iter() {
        e.set((rng.rand_real() - 0.5) / dim);
    }
}

/// Same draws as [`random_init`], one per element, written to both matrices.
fn random_init_pair(a: &Matrix, b: &Matrix, rng: &mut Rng) {
    let dim = a.dim as real;
    for (x, y) in a.data.iter().zip(b.data.iter()) {
        let v = (rng.rand_real() - 0.5) / dim;
        x.set(v);
        y.set(v);
    }
}

pub struct RealParams {
    pub word: Matrix,
    /// `None` for `real_unique`, where contexts share the word vectors.
    ctxt: Option<Matrix>,
    /// Squared-gradient sums for (word, context), when AdaGrad is on.
    pub grad_acc: Option<(Matrix, Matrix)>,
}

impl RealParams {
    pub fn ctxt(&self) -> &Matrix {
        self.ctxt.as_ref().unwrap_or(&self.word)
    }
}

pub struct DualParams {
    pub word_right: Matrix,
    pub word_left: Matrix,
    pub ctxt_right: Matrix,
    pub ctxt_left: Matrix,
}

pub struct ComplexParams {
    pub word_real: Matrix,
    pub word_imag: Matrix,
    pub ctxt_real: Matrix,
    pub ctxt_imag: Matrix,
}

/// All learned parameters of one model.
pub enum EmbeddingStore {
    Real(RealParams),
    Dual(DualParams),
    Complex(ComplexParams),
}

impl EmbeddingStore {
    /// Allocates the matrices `model` needs. Word matrices get small random
    /// values; everything else starts at zero.
    pub fn new(model: ModelType, vocab_size: usize, dim: usize, adagrad: bool) -> Result<Self> {
        let mut rng = Rng(1);
        let zeros = || Matrix::zeros(vocab_size, dim);
        Ok(match model {
            ModelType::ComplexAsym | ModelType::ComplexAlt => {
                let p = ComplexParams {
                    word_real: zeros()?,
                    word_imag: zeros()?,
                    ctxt_real: zeros()?,
                    ctxt_imag: zeros()?,
                };
                random_init_pair(&p.word_real, &p.word_imag, &mut rng);
                EmbeddingStore::Complex(p)
            }
            ModelType::TwoRealAsym | ModelType::TwoRealAlt => {
                let p = DualParams {
                    word_right: zeros()?,
                    word_left: zeros()?,
                    ctxt_right: zeros()?,
                    ctxt_left: zeros()?,
                };
                random_init_pair(&p.word_right, &p.word_left, &mut rng);
                EmbeddingStore::Dual(p)
            }
            ModelType::RealOriginal | ModelType::RealUnique => {
                let word = zeros()?;
                let ctxt = match model {
                    ModelType::RealUnique => None,
                    _ => Some(zeros()?),
                };
                let grad_acc = if adagrad {
                    Some((zeros()?, zeros()?))
                } else {
                    None
                };
                random_init(&word, &mut rng);
                EmbeddingStore::Real(RealParams {
                    word,
                    ctxt,
                    grad_acc,
                })
            }
        })
    }

    pub fn vocab_size(&self) -> usize {
        self.first().rows()
    }

    /// Number of floats per word in the output file.
    pub fn output_size(&self) -> usize {
        match self {
            EmbeddingStore::Real(p) => p.word.dim(),
            _ => 2 * self.first().dim(),
        }
    }

    fn first(&self) -> &Matrix {
        match self {
            EmbeddingStore::Real(p) => &p.word,
            EmbeddingStore::Dual(p) => &p.word_right,
            EmbeddingStore::Complex(p) => &p.word_real,
        }
    }

    /// The vector written out for word `k`. The two-matrix models interleave
    /// their halves element by element: (real, imag) or (right, left).
    pub fn output_vector(&self, k: usize, out: &mut Vec<real>) {
        out.clear();
        let (a, b) = match self {
            EmbeddingStore::Real(p) => {
                out.extend(p.word.row(k).iter().map(Real::get));
                return;
            }
            EmbeddingStore::Dual(p) => (&p.word_right, &p.word_left),
            EmbeddingStore::Complex(p) => (&p.word_real, &p.word_imag),
        };
        for (x, y) in a.row(k).iter().zip(b.row(k)) {
            out.push(x.get());
            out.push(y.get());
        }
    }

    /// All output vectors, `vocab_size * output_size` floats.
    pub fn output_matrix(&self) -> Vec<real> {
        let mut all = Vec::with_capacity(self.vocab_size() * self.output_size());
        let mut v = Vec::with_capacity(self.output_size());
        for k in 0..self.vocab_size() {
            self.output_vector(k, &mut v);
            all.extend_from_slice(&v);
        }
        all
    }
}
