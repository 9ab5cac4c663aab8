use std::collections::HashMap;

use log::debug;

use crate::analysis::Analysis;
use crate::circuit::Component;
use crate::error::Result;
use crate::hierarchy::{Hierarchy, InstanceId};
use crate::resolver::NodeMap;

/// Instance name of every rendered device, keyed by its position in the hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceNames {
    names: HashMap<InstanceId, String>,
}

impl InstanceNames {
    pub fn get(&self, id: InstanceId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn register(&mut self, id: InstanceId, name: String) {
        self.names.entry(id).or_insert(name);
    }
}

/// Rendered device statements plus the measurement requests they imply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Netlist {
    pub statements: String,
    pub saves: Vec<String>,
    pub names: InstanceNames,
}

impl Netlist {
    /// Render every device of `hierarchy`. `root_name` prefixes every instance path.
    pub fn emit(hierarchy: &Hierarchy, nodes: &NodeMap, root_name: &str) -> Result<Self> {
        let mut netlist = Netlist {
            statements: String::new(),
            saves: Vec::new(),
            names: InstanceNames::default(),
        };
        netlist.render(hierarchy, nodes, hierarchy.root(), root_name)?;
        debug!(
            "emitted {} devices, {} measurement requests",
            netlist.names.len(),
            netlist.saves.len()
        );
        Ok(netlist)
    }

    fn render(
        &mut self,
        hierarchy: &Hierarchy,
        nodes: &NodeMap,
        id: InstanceId,
        name: &str,
    ) -> Result<()> {
        let instance = hierarchy.instance(id);
        match instance.component {
            Component::Device(device) => {
                let statement = device.render(name, |port| {
                    instance.port(port).and_then(|key| nodes.get(key))
                })?;
                let full_name = device.instance_name(name);
                for param in device.parameters() {
                    self.saves.push(format!("@{}[{}]", full_name, param));
                }
                self.names.register(id, full_name);
                self.statements.push_str(&statement);
            }
            Component::Block(_) => {
                for child in &instance.children {
                    let key = hierarchy.instance(*child).key.unwrap_or_default();
                    let child_name = format!("{}.{}", name, key);
                    self.render(hierarchy, nodes, *child, &child_name)?;
                }
            }
        }
        Ok(())
    }

    /// Assemble the program fed to the simulator.
    pub fn program(&self, title: &str, analysis: &Analysis) -> String {
        let mut out = String::new();
        out.push_str(title);
        out.push('\n');
        out.push_str(&self.statements);
        out.push_str(".options filetype = ascii\n");
        out.push_str(".save all");
        for save in &self.saves {
            out.push(' ');
            out.push_str(save);
        }
        out.push('\n');
        out.push_str(&analysis.directive());
        out.push('\n');
        out.push_str(".end\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::Block;
    use crate::devices::{capacitor, dc_voltage, resistor};
    use crate::error::Error;
    use crate::resolver::resolve;
    use crate::units::{Farads, Ohms, Volts};

    fn divider() -> Component {
        let d = Block::builder()
            .port("in")
            .port("out")
            .child("R1", resistor(Ohms(1e3)))
            .child("R2", resistor(Ohms(1e3)))
            .connect("in.to.R1.left")
            .connect("R1.right.to.out")
            .connect("R1.right.to.R2.left")
            .connect("R2.right.to.Ground")
            .build()
            .unwrap();
        Block::builder()
            .port("out")
            .child("V", dc_voltage(Volts(10.0)))
            .child("D", d)
            .child("C", capacitor(Farads(1e-6)))
            .connect("V.pos.to.D.in")
            .connect("D.out.to.out")
            .connect("D.out.to.C.left")
            .connect("C.right.to.Ground")
            .connect("V.neg.to.Ground")
            .build()
            .unwrap()
            .into()
    }

    #[test]
    fn test_emit_statements_in_declaration_order() {
        let root = divider();
        let h = Hierarchy::elaborate(&root);
        let nodes = resolve(&h).unwrap();
        let netlist = Netlist::emit(&h, &nodes, "top").unwrap();

        let lines: Vec<&str> = netlist.statements.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Vtop.V "));
        assert!(lines[1].starts_with("Rtop.D.R1 "));
        assert!(lines[2].starts_with("Rtop.D.R2 "));
        assert!(lines[3].starts_with("Ctop.C "));
        assert!(lines[2].ends_with(" 0 1000"));

        let mid = nodes.get(h.port_path("D.R1.right").unwrap()).unwrap();
        assert_eq!(lines[3], format!("Ctop.C {} 0 0.000001", mid));
    }

    #[test]
    fn test_instance_names_and_saves() {
        let root = divider();
        let h = Hierarchy::elaborate(&root);
        let nodes = resolve(&h).unwrap();
        let netlist = Netlist::emit(&h, &nodes, "top").unwrap();

        let r1 = h.child(h.child(h.root(), "D").unwrap(), "R1").unwrap();
        assert_eq!(netlist.names.get(r1), Some("Rtop.D.R1"));
        assert_eq!(netlist.names.len(), 4);
        assert!(netlist.names.get(h.root()).is_none());
        assert_eq!(
            netlist.saves,
            [
                "@Vtop.V[i]",
                "@Vtop.V[p]",
                "@Rtop.D.R1[i]",
                "@Rtop.D.R1[p]",
                "@Rtop.D.R2[i]",
                "@Rtop.D.R2[p]",
            ]
        );
    }

    #[test]
    fn test_program_layout() {
        let root = divider();
        let h = Hierarchy::elaborate(&root);
        let nodes = resolve(&h).unwrap();
        let netlist = Netlist::emit(&h, &nodes, "top").unwrap();
        let program = netlist.program("autogen", &Analysis::OperatingPoint);
        let lines: Vec<&str> = program.lines().collect();

        assert_eq!(lines[0], "autogen");
        assert_eq!(lines[5], ".options filetype = ascii");
        assert!(lines[6].starts_with(".save all @Vtop.V[i]"));
        assert_eq!(lines[7], ".op");
        assert_eq!(lines[8], ".end");
    }

    #[test]
    fn test_floating_device_port_is_reported() {
        let root: Component = Block::builder()
            .child("V", dc_voltage(Volts(1.0)))
            .child("R", resistor(Ohms(1.0)))
            .connect("V.pos.to.R.left")
            .connect("V.neg.to.Ground")
            .allow_floating()
            .build()
            .unwrap()
            .into();
        let h = Hierarchy::elaborate(&root);
        let nodes = resolve(&h).unwrap();
        let err = Netlist::emit(&h, &nodes, "top").unwrap_err();
        assert!(matches!(err, Error::PortNotFound { ref instance, ref port } if instance == "top.R" && port == "right"));
    }

    #[test]
    fn test_root_device() {
        let root: Component = resistor(Ohms(1.0)).into();
        let h = Hierarchy::elaborate(&root);
        assert!(matches!(resolve(&h), Err(Error::NoGroundConnection)));
    }
}
