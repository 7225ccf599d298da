//! Function bodies: block walking, instructions and terminators.

use kes_emit::ops::{eval_float, eval_int, normalize_int, round_float, zero_extend};
use kes_emit::{BlockId, CastOp, FunctionId, Instr, Terminator, TypeKind, ValueDef, ValueId};
use tracing::trace;

use super::{Frame, Machine, Unwind};
use crate::value::Val;
use crate::ExecError;

impl Machine<'_> {
    pub(super) fn exec_body(&mut self, f: FunctionId, args: Vec<Val>) -> Result<Val, Unwind> {
        let module = self.module;
        let func = module.function(f);
        let mut frame = Frame::default();
        for (&param, arg) in func.params.iter().zip(args) {
            frame.values.insert(param, arg);
        }
        let Some(mut bb) = func.entry() else {
            return Err(ExecError::NoSuchFunction(func.name.clone()).into());
        };
        let mut prev: Option<BlockId> = None;
        loop {
            let block = module.block(bb);
            let first = self.enter_block(&mut frame, bb, prev)?;
            for &id in &block.instrs[first..] {
                self.step()?;
                let ValueDef::Instr(instr) = &module.value(id).def else {
                    continue;
                };
                let v = self.exec_instr(&mut frame, id, instr)?;
                frame.values.insert(id, v);
            }
            self.step()?;
            let Some(term) = &block.terminator else {
                return Err(ExecError::MalformedIr(format!(
                    "block '{}' in '{}' has no terminator",
                    block.name, func.name
                ))
                .into());
            };
            let next = match term {
                Terminator::Br(target) => *target,
                Terminator::CondBr {
                    cond,
                    then_bb,
                    else_bb,
                } => {
                    if self.operand(&frame, *cond)?.as_bool().unwrap_or(false) {
                        *then_bb
                    } else {
                        *else_bb
                    }
                }
                Terminator::Ret(value) => {
                    return match value {
                        Some(v) => Ok(self.operand(&frame, *v)?),
                        None => Ok(Val::Void),
                    };
                }
                Terminator::Invoke {
                    function,
                    args,
                    normal,
                    unwind,
                    result,
                } => {
                    let args = self.operands(&frame, args)?;
                    match self.call_function(*function, args) {
                        Ok(v) => {
                            if let Some(r) = result {
                                frame.values.insert(*r, v);
                            }
                            *normal
                        }
                        Err(Unwind::Throw(exc)) if self.pad_catches(*unwind, exc.descriptor) => {
                            frame.in_flight = Some(exc);
                            *unwind
                        }
                        Err(e) => return Err(e),
                    }
                }
                Terminator::Resume(pad) => {
                    let payload = match self.operand(&frame, *pad)? {
                        Val::Agg(fields) => fields.first().and_then(Val::as_ptr).unwrap_or(0),
                        other => other.as_ptr().unwrap_or(0),
                    };
                    let exc = self.thrown.get(&payload).copied().ok_or_else(|| {
                        ExecError::MalformedIr(format!("resume of unknown exception {payload:#x}"))
                    })?;
                    return Err(Unwind::Throw(exc));
                }
                Terminator::Unreachable => {
                    return Err(ExecError::Unreachable {
                        function: func.name.clone(),
                    }
                    .into());
                }
            };
            prev = Some(bb);
            bb = next;
        }
    }

    /// Whether the landing pad at the head of `bb` selects `descriptor`.
    fn pad_catches(&self, bb: BlockId, descriptor: u64) -> bool {
        let block = self.module.block(bb);
        let Some(&first) = block.instrs.first() else {
            return false;
        };
        match &self.module.value(first).def {
            ValueDef::Instr(Instr::LandingPad { clauses, catch_all }) => {
                *catch_all
                    || clauses
                        .iter()
                        .any(|&c| self.const_val(c).ok().and_then(|v| v.as_ptr()) == Some(descriptor))
            }
            _ => false,
        }
    }

    /// Evaluate the leading phis of `bb` as one parallel assignment.
    /// Returns the index of the first non-phi instruction.
    fn enter_block(
        &mut self,
        frame: &mut Frame,
        bb: BlockId,
        prev: Option<BlockId>,
    ) -> Result<usize, Unwind> {
        let block = self.module.block(bb);
        let mut staged = Vec::new();
        let mut count = 0;
        for &id in &block.instrs {
            let ValueDef::Instr(Instr::Phi { incoming }) = &self.module.value(id).def else {
                break;
            };
            let from = prev.ok_or_else(|| {
                ExecError::MalformedIr(format!("phi in entry block '{}'", block.name))
            })?;
            let (value, _) = incoming.iter().find(|(_, b)| *b == from).ok_or_else(|| {
                ExecError::MalformedIr(format!("phi {id:?} has no edge from {from:?}"))
            })?;
            staged.push((id, self.operand(frame, *value)?));
            count += 1;
        }
        for (id, v) in staged {
            frame.values.insert(id, v);
        }
        Ok(count)
    }

    fn operand(&self, frame: &Frame, id: ValueId) -> Result<Val, ExecError> {
        if let Some(v) = frame.values.get(&id) {
            return Ok(v.clone());
        }
        match self.module.value(id).def {
            ValueDef::Instr(_) | ValueDef::InvokeResult | ValueDef::Param { .. } => Err(
                ExecError::MalformedIr(format!("{id:?} used before definition")),
            ),
            _ => self.const_val(id),
        }
    }

    fn operands(&self, frame: &Frame, ids: &[ValueId]) -> Result<Vec<Val>, ExecError> {
        ids.iter().map(|&id| self.operand(frame, id)).collect()
    }

    fn int_bits(&self, id: ValueId) -> u32 {
        match self.module.types().kind(self.module.value(id).ty) {
            TypeKind::Int { bits } | TypeKind::Float { bits } => bits,
            _ => 64,
        }
    }

    fn int_operand(&self, frame: &Frame, id: ValueId) -> Result<i64, ExecError> {
        let v = self.operand(frame, id)?;
        v.as_int()
            .ok_or_else(|| ExecError::MalformedIr(format!("expected an integer, got {v:?}")))
    }

    fn float_operand(&self, frame: &Frame, id: ValueId) -> Result<f64, ExecError> {
        let v = self.operand(frame, id)?;
        v.as_float()
            .ok_or_else(|| ExecError::MalformedIr(format!("expected a float, got {v:?}")))
    }

    fn ptr_operand(&self, frame: &Frame, id: ValueId) -> Result<u64, ExecError> {
        let v = self.operand(frame, id)?;
        v.as_ptr()
            .ok_or_else(|| ExecError::MalformedIr(format!("expected a pointer, got {v:?}")))
    }

    fn exec_instr(&mut self, frame: &mut Frame, id: ValueId, instr: &Instr) -> Result<Val, Unwind> {
        let module = self.module;
        let types = module.types();
        let result_ty = module.value(id).ty;
        let val = match instr {
            Instr::Binary { op, lhs, rhs } => {
                let bits = self.int_bits(*lhs);
                if op.is_float() {
                    let a = self.float_operand(frame, *lhs)?;
                    let b = self.float_operand(frame, *rhs)?;
                    Val::Float(eval_float(*op, a, b, bits).unwrap_or(f64::NAN))
                } else {
                    let a = self.int_operand(frame, *lhs)?;
                    let b = self.int_operand(frame, *rhs)?;
                    Val::Int(eval_int(*op, a, b, bits).ok_or(ExecError::DivisionByZero)?)
                }
            }
            Instr::ICmp { pred, lhs, rhs } => {
                let a = self.int_operand(frame, *lhs)?;
                let b = self.int_operand(frame, *rhs)?;
                Val::Int(i64::from(pred.eval(a, b)))
            }
            Instr::FCmp { pred, lhs, rhs } => {
                let a = self.float_operand(frame, *lhs)?;
                let b = self.float_operand(frame, *rhs)?;
                Val::Int(i64::from(pred.eval(a, b)))
            }
            Instr::Cast { op, value } => self.cast(frame, *op, *value, result_ty)?,
            Instr::Alloca { ty } => {
                Val::Ptr(self.memory.alloc_stack(types.size_of(*ty), types.align_of(*ty))?)
            }
            Instr::Load { ptr } => {
                let addr = self.ptr_operand(frame, *ptr)?;
                self.memory.read(types, addr, result_ty)?
            }
            Instr::Store { value, ptr } => {
                let addr = self.ptr_operand(frame, *ptr)?;
                let v = self.operand(frame, *value)?;
                self.memory.write(types, addr, module.value(*value).ty, &v)?;
                Val::Void
            }
            Instr::StructGep { ptr, index } => {
                let addr = self.ptr_operand(frame, *ptr)?;
                let offset = match types.kind(module.value(*ptr).ty) {
                    TypeKind::Pointer { pointee } => types.field_offset(pointee, *index),
                    _ => None,
                }
                .ok_or_else(|| ExecError::MalformedIr(format!("bad struct gep {id:?}")))?;
                Val::Ptr(addr + offset)
            }
            Instr::Gep { ptr, index } => {
                let addr = self.ptr_operand(frame, *ptr)?;
                let i = self.int_operand(frame, *index)?;
                let size = match types.kind(module.value(*ptr).ty) {
                    TypeKind::Pointer { pointee } => types.size_of(pointee),
                    _ => 1,
                };
                Val::Ptr(addr.wrapping_add((i as u64).wrapping_mul(size)))
            }
            Instr::ExtractValue { aggregate, index } => match self.operand(frame, *aggregate)? {
                Val::Agg(mut fields) if (*index as usize) < fields.len() => {
                    fields.swap_remove(*index as usize)
                }
                other => {
                    return Err(ExecError::MalformedIr(format!(
                        "extractvalue {index} from {other:?}"
                    ))
                    .into())
                }
            },
            Instr::Phi { .. } => {
                return Err(ExecError::MalformedIr(format!("phi {id:?} after block head")).into())
            }
            Instr::Call { function, args } => {
                let args = self.operands(frame, args)?;
                self.call_function(*function, args)?
            }
            Instr::LandingPad { .. } => {
                let exc = frame.in_flight.take().ok_or_else(|| {
                    ExecError::MalformedIr("landing pad reached without an exception".to_owned())
                })?;
                let selector = self.typeid_for(exc.descriptor);
                Val::Agg(vec![Val::Ptr(exc.payload), Val::Int(selector)])
            }
            Instr::TypeIdFor { descriptor } => {
                let addr = self.ptr_operand(frame, *descriptor)?;
                Val::Int(self.typeid_for(addr))
            }
            Instr::InlineAsm { text } => {
                trace!(asm = %text, "inline asm skipped");
                Val::Void
            }
        };
        Ok(val)
    }

    fn cast(
        &self,
        frame: &Frame,
        op: CastOp,
        value: ValueId,
        to: kes_emit::TypeId,
    ) -> Result<Val, ExecError> {
        let types = self.module.types();
        let to_bits = match types.kind(to) {
            TypeKind::Int { bits } | TypeKind::Float { bits } => bits,
            _ => 64,
        };
        let from_bits = self.int_bits(value);
        Ok(match op {
            CastOp::Trunc | CastOp::SExt => Val::Int(normalize_int(self.int_operand(frame, value)?, to_bits)),
            CastOp::ZExt => {
                let v = zero_extend(self.int_operand(frame, value)?, from_bits);
                Val::Int(normalize_int(v, to_bits))
            }
            CastOp::FPTrunc | CastOp::FPExt => {
                Val::Float(round_float(self.float_operand(frame, value)?, to_bits))
            }
            CastOp::FPToSI => {
                Val::Int(normalize_int(self.float_operand(frame, value)? as i64, to_bits))
            }
            CastOp::SIToFP => {
                Val::Float(round_float(self.int_operand(frame, value)? as f64, to_bits))
            }
            CastOp::PtrToInt => Val::Int(normalize_int(self.ptr_operand(frame, value)? as i64, to_bits)),
            CastOp::IntToPtr => Val::Ptr(self.int_operand(frame, value)? as u64),
            CastOp::BitCast => self.operand(frame, value)?,
        })
    }
}
