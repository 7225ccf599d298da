//! LLVM-flavoured textual dump of an `IrModule`.

use std::fmt::{self, Write as _};

use super::{Constant, Instr, IrModule, Terminator, ValueDef};
use crate::{BlockId, FunctionId, ValueId};

impl IrModule {
    fn operand(&self, v: ValueId) -> String {
        let data = self.value(v);
        let ty = self.types.display(data.ty);
        format!("{ty} {}", self.operand_bare(v))
    }

    fn operand_bare(&self, v: ValueId) -> String {
        match &self.value(v).def {
            ValueDef::Const(c) => self.constant_text(c),
            ValueDef::Param { index, .. } => format!("%arg{index}"),
            ValueDef::Global(i) => format!("@\"{}\"", self.global(*i).name),
            ValueDef::Function(f) => format!("@\"{}\"", self.function(*f).name),
            ValueDef::Instr(_) | ValueDef::InvokeResult => format!("%{}", v.raw()),
        }
    }

    fn constant_text(&self, c: &Constant) -> String {
        match c {
            Constant::Int(i) => i.to_string(),
            Constant::Float(f) => format!("{f:e}"),
            Constant::Null => "null".to_owned(),
            Constant::Zero => "zeroinitializer".to_owned(),
            Constant::Struct(fields) => {
                let parts: Vec<String> = fields.iter().map(|&f| self.operand(f)).collect();
                format!("{{ {} }}", parts.join(", "))
            }
            Constant::Bytes(bytes) => {
                let mut out = String::from("c\"");
                for &b in bytes {
                    if (b.is_ascii_graphic() && b != b'"' && b != b'\\') || b == b' ' {
                        out.push(char::from(b));
                    } else {
                        let _ = write!(out, "\\{b:02X}");
                    }
                }
                out.push('"');
                out
            }
        }
    }

    fn block_label(&self, bb: BlockId) -> String {
        format!("%{}.{}", self.block(bb).name, bb.raw())
    }

    fn args_text(&self, args: &[ValueId]) -> String {
        args.iter()
            .map(|&a| self.operand(a))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn callee_text(&self, f: FunctionId) -> String {
        format!("@\"{}\"", self.function(f).name)
    }

    fn instr_text(&self, v: ValueId, instr: &Instr) -> String {
        let result = format!("%{} = ", v.raw());
        match instr {
            Instr::Binary { op, lhs, rhs } => {
                format!("{result}{op} {}, {}", self.operand(*lhs), self.operand_bare(*rhs))
            }
            Instr::ICmp { pred, lhs, rhs } => format!(
                "{result}icmp {} {}, {}",
                pred.as_str(),
                self.operand(*lhs),
                self.operand_bare(*rhs)
            ),
            Instr::FCmp { pred, lhs, rhs } => format!(
                "{result}fcmp {} {}, {}",
                pred.as_str(),
                self.operand(*lhs),
                self.operand_bare(*rhs)
            ),
            Instr::Cast { op, value } => format!(
                "{result}{op} {} to {}",
                self.operand(*value),
                self.types.display(self.value(v).ty)
            ),
            Instr::Alloca { ty } => format!("{result}alloca {}", self.types.display(*ty)),
            Instr::Load { ptr } => format!(
                "{result}load {}, {}",
                self.types.display(self.value(v).ty),
                self.operand(*ptr)
            ),
            Instr::Store { value, ptr } => {
                format!("store {}, {}", self.operand(*value), self.operand(*ptr))
            }
            Instr::StructGep { ptr, index } => {
                format!("{result}getelementptr {}, i32 0, i32 {index}", self.operand(*ptr))
            }
            Instr::Gep { ptr, index } => format!(
                "{result}getelementptr {}, {}",
                self.operand(*ptr),
                self.operand(*index)
            ),
            Instr::ExtractValue { aggregate, index } => {
                format!("{result}extractvalue {}, {index}", self.operand(*aggregate))
            }
            Instr::Phi { incoming } => {
                let arms: Vec<String> = incoming
                    .iter()
                    .map(|&(val, bb)| format!("[ {}, {} ]", self.operand_bare(val), self.block_label(bb)))
                    .collect();
                format!(
                    "{result}phi {} {}",
                    self.types.display(self.value(v).ty),
                    arms.join(", ")
                )
            }
            Instr::Call { function, args } => {
                let ret = self.types.display(self.value(v).ty);
                let call = format!("call {ret} {}({})", self.callee_text(*function), self.args_text(args));
                if ret == "void" {
                    call
                } else {
                    format!("{result}{call}")
                }
            }
            Instr::LandingPad { clauses, catch_all } => {
                let mut text = format!("{result}landingpad {{ i8*, i32 }}");
                for &c in clauses {
                    let _ = write!(text, " catch {}", self.operand(c));
                }
                if *catch_all {
                    text.push_str(" catch i8* null");
                }
                text
            }
            Instr::TypeIdFor { descriptor } => {
                format!("{result}call i32 @llvm.eh.typeid.for({})", self.operand(*descriptor))
            }
            Instr::InlineAsm { text } => format!("call void asm sideeffect \"{text}\", \"\"()"),
        }
    }

    fn terminator_text(&self, term: &Terminator) -> String {
        match term {
            Terminator::Br(bb) => format!("br label {}", self.block_label(*bb)),
            Terminator::CondBr {
                cond,
                then_bb,
                else_bb,
            } => format!(
                "br {}, label {}, label {}",
                self.operand(*cond),
                self.block_label(*then_bb),
                self.block_label(*else_bb)
            ),
            Terminator::Ret(Some(v)) => format!("ret {}", self.operand(*v)),
            Terminator::Ret(None) => "ret void".to_owned(),
            Terminator::Invoke {
                function,
                args,
                normal,
                unwind,
                result,
            } => {
                let prefix = result.map(|r| format!("%{} = ", r.raw())).unwrap_or_default();
                format!(
                    "{prefix}invoke {}({}) to label {} unwind label {}",
                    self.callee_text(*function),
                    self.args_text(args),
                    self.block_label(*normal),
                    self.block_label(*unwind)
                )
            }
            Terminator::Resume(v) => format!("resume {}", self.operand(*v)),
            Terminator::Unreachable => "unreachable".to_owned(),
        }
    }
}

impl fmt::Display for IrModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name())?;
        for global in self.globals() {
            let init = global
                .init
                .map_or_else(|| "zeroinitializer".to_owned(), |i| self.operand_bare(i));
            writeln!(
                f,
                "@\"{}\" = global {} {}",
                global.name,
                self.types.display(global.value_ty),
                init
            )?;
        }
        for (_, func) in self.functions() {
            let sig = self.types.function_sig(func.ty);
            let ret = sig
                .as_ref()
                .map_or_else(|| "void".to_owned(), |s| self.types.display(s.ret));
            let params: Vec<String> = func.params.iter().map(|&p| self.operand(p)).collect();
            let mut params = params.join(", ");
            if sig.as_ref().is_some_and(|s| s.variadic) {
                params.push_str(if params.is_empty() { "..." } else { ", ..." });
            }
            if func.is_declaration() {
                writeln!(f, "\ndeclare {ret} @\"{}\"({params})", func.name)?;
                continue;
            }
            writeln!(f, "\ndefine {ret} @\"{}\"({params}) {{", func.name)?;
            for &bb in &func.blocks {
                let block = self.block(bb);
                writeln!(f, "{}.{}:", block.name, bb.raw())?;
                for &v in &block.instrs {
                    if let ValueDef::Instr(instr) = &self.value(v).def {
                        writeln!(f, "  {}", self.instr_text(v, instr))?;
                    }
                }
                if let Some(term) = &block.terminator {
                    writeln!(f, "  {}", self.terminator_text(term))?;
                }
            }
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}
