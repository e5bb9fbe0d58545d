use crate::{
    runtime::Interpreter,
    value::{Module, Value, ValueType},
};

pub fn module(_: &mut Interpreter) -> Value {
    ValueType::ALL
        .iter()
        .fold(Module::new("Types"), |module, &value_type| {
            module.with(value_type.name(), Value::type_value(value_type))
        })
        .into()
}
