use std::sync::Arc;

use lazy_static::lazy_static;

use crate::device::{Device, Template};
use crate::units::{Amps, Farads, Hertz, Ohms, Volts};

lazy_static! {
    static ref RESISTOR: Arc<Template> = template("R{name} {left:port} {right:port} {resistance:Ohms}");
    static ref CAPACITOR: Arc<Template> =
        template("C{name} {left:port} {right:port} {capacitance:Farads}");
    static ref DC_VOLTAGE: Arc<Template> = template("V{name} {pos:port} {neg:port} {voltage:Volts}");
    static ref DC_CURRENT: Arc<Template> = template("I{name} {pos:port} {neg:port} {current:Amps}");
    static ref AC_VOLTAGE: Arc<Template> = template(
        "V{name} {pos:port} {neg:port} SIN({offset:Volts} {amplitude:Volts} {freq:Hertz})"
    );
    static ref MOSFET: Arc<Template> = template(
        "M{name} {drain:port} {gate:port} {source:port} {base:port} MODDEP L=4U W=6U AD=10P AS=10P\n\
         .MODEL MODDEP NMOS VTO=-2 NSUB=1.0E15 UO=550"
    );
    static ref NMOS: Arc<Template> = template(
        "M{name} {drain:port} {gate:port} {source:port} {base:port} MOD1 L=4U W=6U AD=10P AS=10P\n\
         .MODEL MOD1 NMOS"
    );
    static ref PMOS: Arc<Template> = template(
        "M{name} {drain:port} {gate:port} {source:port} {base:port} MOD2 L=4U W=6U AD=10P AS=10P\n\
         .MODEL MOD2 PMOS"
    );
}

fn template(text: &str) -> Arc<Template> {
    Arc::new(Template::parse(text).unwrap())
}

pub fn resistor(resistance: Ohms) -> Device {
    Device::new(RESISTOR.clone())
        .with("resistance", resistance)
        .watch(["i", "p"])
}

pub fn capacitor(capacitance: Farads) -> Device {
    Device::new(CAPACITOR.clone()).with("capacitance", capacitance)
}

pub fn dc_voltage(voltage: Volts) -> Device {
    Device::new(DC_VOLTAGE.clone())
        .with("voltage", voltage)
        .watch(["i", "p"])
}

pub fn dc_current(current: Amps) -> Device {
    Device::new(DC_CURRENT.clone())
        .with("current", current)
        .watch(["c", "p"])
}

/// Sinusoidal source: `offset + amplitude * sin(2π freq t)`.
pub fn ac_voltage(offset: Volts, amplitude: Volts, freq: Hertz) -> Device {
    Device::new(AC_VOLTAGE.clone())
        .with("offset", offset)
        .with("amplitude", amplitude)
        .with("freq", freq)
}

/// Depletion-mode NMOS with an explicit model card.
pub fn mosfet() -> Device {
    Device::new(MOSFET.clone()).watch(["id", "ig", "is"])
}

pub fn nmos() -> Device {
    Device::new(NMOS.clone()).watch(["id", "ig", "is", "vds", "vgs"])
}

pub fn pmos() -> Device {
    Device::new(PMOS.clone()).watch(["id", "ig", "is", "vds", "vgs"])
}
