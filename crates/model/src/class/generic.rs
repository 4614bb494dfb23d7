use super::{Class, ClassKind, EdgeClass, EdgeLinks, NodeClass};
use crate::model::Model;
use reshape_core::{ClassId, Result};

/// A class with no graph meaning yet.
#[derive(Clone, Debug)]
pub struct GenericClass {
    model: Model,
    class_id: ClassId,
}

impl GenericClass {
    pub(crate) fn new(model: Model, class_id: ClassId) -> Self {
        Self { model, class_id }
    }
}

impl Class for GenericClass {
    fn model(&self) -> &Model {
        &self.model
    }

    fn class_id(&self) -> ClassId {
        self.class_id
    }

    fn delete(&self) -> Result<()> {
        self.model.remove_class(self.class_id)
    }

    fn interpret_as_generic(&self) -> Result<GenericClass> {
        Ok(self.clone())
    }

    fn interpret_as_nodes(&self) -> Result<NodeClass> {
        self.model.reinterpret_class(
            self.class_id,
            ClassKind::Node {
                edge_class_ids: Default::default(),
            },
        )?;
        Ok(NodeClass::new(self.model.clone(), self.class_id))
    }

    fn interpret_as_edges(&self) -> Result<EdgeClass> {
        self.model
            .reinterpret_class(self.class_id, ClassKind::Edge(EdgeLinks::default()))?;
        Ok(EdgeClass::new(self.model.clone(), self.class_id))
    }
}
