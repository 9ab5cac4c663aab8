use crate::circuit::Block;
use crate::devices::{nmos, pmos, resistor};
use crate::error::Result;
use crate::units::Ohms;

/// Resistive divider with `out = ratio * in` when unloaded.
///
/// R2 is fixed at 1kΩ and R1 is chosen to give `ratio`.
pub fn voltage_divider(ratio: f64) -> Result<Block> {
    Block::builder()
        .port("in")
        .port("out")
        .child("R1", resistor(Ohms((1e3 - ratio * 1e3) / ratio)))
        .child("R2", resistor(Ohms(1e3)))
        .connect("in.to.R1.left")
        .connect("R1.right.to.out")
        .connect("R1.right.to.R2.left")
        .connect("R2.right.to.Ground")
        .build()
}

/// One diode-connected NMOS reference mirrored onto two outputs. `Bias` feeds the reference
/// drain and every source sits on `Sink`.
pub fn nmos_double_current_mirror() -> Result<Block> {
    Block::builder()
        .port("Bias")
        .port("Sink")
        .port("Drain1")
        .port("Drain2")
        .child("Ref", nmos())
        .child("Mirror1", nmos())
        .child("Mirror2", nmos())
        .connect_all([
            "Bias.to.Ref.drain",
            "Ref.drain.to.Ref.gate",
            "Ref.source.to.Sink",
            "Ref.base.to.Ref.source",
            "Drain1.to.Mirror1.drain",
            "Ref.gate.to.Mirror1.gate",
            "Mirror1.source.to.Sink",
            "Mirror1.base.to.Mirror1.source",
            "Drain2.to.Mirror2.drain",
            "Ref.gate.to.Mirror2.gate",
            "Mirror2.source.to.Sink",
            "Mirror2.base.to.Mirror1.source",
        ])
        .build()
}

pub fn pmos_current_mirror() -> Result<Block> {
    Block::builder()
        .port("Source")
        .port("Bias")
        .port("Mirrored")
        .child("Ref", pmos())
        .child("Mirror", pmos())
        .connect_all([
            "Source.to.Ref.source",
            "Ref.drain.to.Ref.gate",
            "Ref.drain.to.Bias",
            "Ref.base.to.Ref.source",
            "Source.to.Mirror.source",
            "Ref.gate.to.Mirror.gate",
            "Mirror.drain.to.Mirrored",
            "Mirror.base.to.Mirror.source",
        ])
        .build()
}

/// Source-coupled NMOS pair.
pub fn differential_pair() -> Result<Block> {
    Block::builder()
        .port("InPos")
        .port("InNeg")
        .port("OutPos")
        .port("OutNeg")
        .port("Source")
        .child("Neg", nmos())
        .child("Pos", nmos())
        .connect_all([
            "OutNeg.to.Neg.drain",
            "Pos.drain.to.OutPos",
            "InNeg.to.Neg.gate",
            "Pos.gate.to.InPos",
            "Neg.source.to.Source",
            "Source.to.Pos.source",
            "Neg.base.to.Neg.source",
            "Pos.base.to.Pos.source",
        ])
        .build()
}

/// Single PMOS gain stage; `Out` and `Drain` are the same node.
pub fn common_source_amplifier() -> Result<Block> {
    Block::builder()
        .port("In")
        .port("Out")
        .port("Source")
        .port("Drain")
        .child("FET", pmos())
        .connect_all([
            "Source.to.FET.source",
            "In.to.FET.gate",
            "FET.drain.to.Out",
            "FET.drain.to.Drain",
            "FET.base.to.FET.source",
        ])
        .build()
}

/// Two-stage operational amplifier: differential input with a PMOS mirror load, a
/// common-source output stage, both biased from one NMOS mirror.
pub fn op_amp() -> Result<Block> {
    Block::builder()
        .port("VDD")
        .port("VSS")
        .port("Bias")
        .port("InPos")
        .port("InNeg")
        .port("Out")
        .child("DiffPairCurrentMirror", pmos_current_mirror()?)
        .child("DiffPair", differential_pair()?)
        .child("MasterCurrentMirror", nmos_double_current_mirror()?)
        .child("OutputAmplifier", common_source_amplifier()?)
        .connect_all([
            "VDD.to.DiffPairCurrentMirror.Source",
            "VDD.to.OutputAmplifier.Source",
            "DiffPairCurrentMirror.Bias.to.DiffPair.OutNeg",
            "DiffPairCurrentMirror.Mirrored.to.DiffPair.OutPos",
            "InNeg.to.DiffPair.InNeg",
            "DiffPair.InPos.to.InPos",
            "DiffPair.OutNeg.to.OutputAmplifier.In",
            "OutputAmplifier.Out.to.Out",
            "DiffPair.Source.to.MasterCurrentMirror.Drain1",
            "OutputAmplifier.Drain.to.MasterCurrentMirror.Drain2",
            "Bias.to.MasterCurrentMirror.Bias",
            "VSS.to.MasterCurrentMirror.Sink",
        ])
        .build()
}
