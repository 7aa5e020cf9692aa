//! The per-pair gradient steps of the three models.

use crate::batch::TrainingPair;
use crate::real;
use crate::store::{dot, ComplexParams, DualParams, RealParams};

const EXP_TABLE_SIZE: usize = 1000;
const MAX_EXP: real = 6.0;
const ADAGRAD_REG: real = 1e-8;

/// Precomputed logistic function over `[-MAX_EXP, MAX_EXP]`.
pub struct Sigmoid {
    exp_table: Vec<real>,
}

impl Default for Sigmoid {
    fn default() -> Self {
        Self::new()
    }
}

impl Sigmoid {
    pub fn new() -> Self {
        let exp_table = (0..EXP_TABLE_SIZE)
            .map(|i| {
                // exp() in double precision, stored as f32.
                let j = (i as real / EXP_TABLE_SIZE as real * 2.0 - 1.0) * MAX_EXP;
                let e = (j as f64).exp() as f32; // Precompute the exp() table
                e / (e + 1.0) // Precompute f(x) = x / (x + 1)
            })
            .collect();
        Sigmoid { exp_table }
    }

    /// Approximate the logistic function, 1 / (1 + e^-x). Clamps to 0 and 1
    /// outside the table.
    pub fn get(&self, x: real) -> real {
        if x > MAX_EXP {
            1.0
        } else if x < -MAX_EXP {
            0.0
        } else {
            // 1000 / 6 / 2 in integer arithmetic, 83.
            let scale = (EXP_TABLE_SIZE / MAX_EXP as usize / 2) as real;
            self.exp_table[((x + MAX_EXP) * scale) as usize]
        }
    }

    /// `label - sigmoid(f)`: the gradient of the log-likelihood with respect
    /// to the score.
    pub fn gradient(&self, f: real, label: bool) -> real {
        let label = if label { 1.0 } else { 0.0 };
        label - self.get(f)
    }
}

/// One model's update rule, applied by each worker thread to its own stream
/// of training pairs.
///
/// Contributions to the center word are collected in `Scratch` and only
/// committed to the shared word matrix at pairs flagged `apply_update`;
/// target vectors are updated immediately.
pub trait Kernel: Sync {
    type Scratch: Send;

    fn scratch(&self) -> Self::Scratch;

    fn train_pair(&self, pair: &TrainingPair, alpha: real, scratch: &mut Self::Scratch);
}

pub struct RealKernel<'a> {
    pub params: &'a RealParams,
    pub sigmoid: &'a Sigmoid,
}

impl RealKernel<'_> {
    pub fn score(&self, center: usize, target: usize) -> real {
        dot(self.params.word.row(center), self.params.ctxt().row(target))
    }
}

/// AdaGrad step `alpha / (sqrt(acc) + eps) * grad`, in double precision.
fn adagrad_step(alpha: real, acc: real, grad: real) -> f64 {
    alpha as f64 / ((acc as f64).sqrt() + ADAGRAD_REG as f64) * grad as f64
}

impl Kernel for RealKernel<'_> {
    type Scratch = Vec<real>;

    fn scratch(&self) -> Vec<real> {
        vec![0.0; self.params.word.dim()]
    }

    fn train_pair(&self, pair: &TrainingPair, alpha: real, grad_word: &mut Vec<real>) {
        let word = self.params.word.row(pair.center);
        // For real_unique this aliases `word` when center == target; every
        // element is read and written in order, so the word update sees the
        // context update just made.
        let ctxt = self.params.ctxt().row(pair.target);

        let f = dot(word, ctxt);
        let g = self.sigmoid.gradient(f, pair.label);

        match &self.params.grad_acc {
            Some((word_acc, ctxt_acc)) => {
                let word_acc = word_acc.row(pair.center);
                let ctxt_acc = ctxt_acc.row(pair.target);
                for c in 0..grad_word.len() {
                    let tmp = g * ctxt[c].get();
                    word_acc[c].add(tmp * tmp);
                    grad_word[c] =
                        (grad_word[c] as f64 + adagrad_step(alpha, word_acc[c].get(), tmp)) as real;

                    let tmp = g * word[c].get();
                    ctxt_acc[c].add(tmp * tmp);
                    ctxt[c].set(
                        (ctxt[c].get() as f64 + adagrad_step(alpha, ctxt_acc[c].get(), tmp))
                            as real,
                    );
                }
            }
            None => {
                let g = g * alpha;
                for c in 0..grad_word.len() {
                    grad_word[c] += g * ctxt[c].get();
                    ctxt[c].add(g * word[c].get());
                }
            }
        }

        if pair.apply_update {
            for (w, e) in word.iter().zip(grad_word.iter_mut()) {
                w.add(*e);
                *e = 0.0;
            }
        }
    }
}

pub struct DualKernel<'a> {
    pub params: &'a DualParams,
    pub sigmoid: &'a Sigmoid,
}

pub struct DualScratch {
    right: Vec<real>,
    left: Vec<real>,
}

impl Kernel for DualKernel<'_> {
    type Scratch = DualScratch;

    fn scratch(&self) -> DualScratch {
        let dim = self.params.word_right.dim();
        DualScratch {
            right: vec![0.0; dim],
            left: vec![0.0; dim],
        }
    }

    fn train_pair(&self, pair: &TrainingPair, alpha: real, scratch: &mut DualScratch) {
        let p = self.params;
        let (word, ctxt, grad) = if pair.order_sign == 1.0 {
            (
                p.word_right.row(pair.center),
                p.ctxt_right.row(pair.target),
                &mut scratch.right,
            )
        } else {
            (
                p.word_left.row(pair.center),
                p.ctxt_left.row(pair.target),
                &mut scratch.left,
            )
        };

        let f = dot(word, ctxt);
        let g = self.sigmoid.gradient(f, pair.label) * alpha;
        for c in 0..grad.len() {
            grad[c] += g * ctxt[c].get();
            ctxt[c].add(g * word[c].get());
        }

        if pair.apply_update {
            let right = p.word_right.row(pair.center);
            let left = p.word_left.row(pair.center);
            for c in 0..right.len() {
                right[c].add(scratch.right[c]);
                left[c].add(scratch.left[c]);
            }
            scratch.right.fill(0.0);
            scratch.left.fill(0.0);
        }
    }
}

pub struct ComplexKernel<'a> {
    pub params: &'a ComplexParams,
    pub sigmoid: &'a Sigmoid,
}

pub struct ComplexScratch {
    real: Vec<real>,
    imag: Vec<real>,
}

impl ComplexKernel<'_> {
    /// `Re + order_sign * Im` of the complex inner product of the center and
    /// target vectors.
    pub fn score(&self, center: usize, target: usize, order_sign: real) -> real {
        let p = self.params;
        let wr = p.word_real.row(center);
        let wi = p.word_imag.row(center);
        let cr = p.ctxt_real.row(target);
        let ci = p.ctxt_imag.row(target);
        let dot_real = dot(wr, cr) + dot(wi, ci);
        let dot_imag = dot(wr, ci) - dot(wi, cr);
        dot_real + order_sign * dot_imag
    }
}

impl Kernel for ComplexKernel<'_> {
    type Scratch = ComplexScratch;

    fn scratch(&self) -> ComplexScratch {
        let dim = self.params.word_real.dim();
        ComplexScratch {
            real: vec![0.0; dim],
            imag: vec![0.0; dim],
        }
    }

    fn train_pair(&self, pair: &TrainingPair, alpha: real, scratch: &mut ComplexScratch) {
        let p = self.params;
        let s = pair.order_sign;
        let wr = p.word_real.row(pair.center);
        let wi = p.word_imag.row(pair.center);
        let cr = p.ctxt_real.row(pair.target);
        let ci = p.ctxt_imag.row(pair.target);

        let f = self.score(pair.center, pair.target, s);
        let g = self.sigmoid.gradient(f, pair.label) * alpha;

        for c in 0..scratch.real.len() {
            scratch.real[c] += g * (cr[c].get() + s * ci[c].get());
            scratch.imag[c] += g * (ci[c].get() - s * cr[c].get());
            cr[c].add(g * (wr[c].get() - s * wi[c].get()));
            ci[c].add(g * (wi[c].get() + s * wr[c].get()));
        }

        if pair.apply_update {
            for c in 0..wr.len() {
                wr[c].add(scratch.real[c]);
                wi[c].add(scratch.imag[c]);
            }
            scratch.real.fill(0.0);
            scratch.imag.fill(0.0);
        }
    }
}
