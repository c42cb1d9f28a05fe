//! Shared fixtures: synthetic target modules and a narrow evaluator for
//! auto-property setter bodies.
#![allow(dead_code)]

use cilpatch::prelude::*;

/// Flags of an instance constructor.
pub fn ctor_flags() -> MethodAttributes {
    MethodAttributes::SPECIAL_NAME | MethodAttributes::RT_SPECIAL_NAME
}

/// Flags of a property accessor.
pub fn accessor_flags() -> MethodAttributes {
    MethodAttributes::HIDE_BY_SIG | MethodAttributes::SPECIAL_NAME
}

fn auto_setter(name: &str, field: Token) -> Method {
    let mut setter = Method::new(name, accessor_flags());
    setter.body.max_stack = 2;
    setter.body.push(OpCode::Ldarg0, Operand::None);
    setter.body.push(OpCode::Ldarg1, Operand::None);
    setter.body.push(OpCode::Stfld, Operand::Token(field));
    setter.body.push(OpCode::Ret, Operand::None);
    setter
}

fn auto_getter(name: &str, field: Token) -> Method {
    let mut getter = Method::new(name, accessor_flags());
    getter.body.max_stack = 1;
    getter.body.push(OpCode::Ldarg0, Operand::None);
    getter.body.push(OpCode::Ldfld, Operand::Token(field));
    getter.body.push(OpCode::Ret, Operand::None);
    getter
}

/// The base type holding the import-mode property, as its own module.
///
/// Token values assume the base type is the first type of its module with one
/// field.
pub fn base_module(name: &str) -> Module {
    let mut module = Module::new(name);

    let mut base = TypeDef::new("Microsoft.CodeAnalysis", "CompilationOptions");
    base.fields.push(Field {
        name: "_importOptions".into(),
        type_name: "MetadataImportOptions".into(),
    });
    base.methods
        .push(auto_getter("get_MetadataImportOptions", Token::field(1)));
    base.methods
        .push(auto_setter("set_MetadataImportOptions", Token::field(1)));
    base.properties.push(Property {
        name: "MetadataImportOptions".into(),
        type_name: "MetadataImportOptions".into(),
        getter: Some(0),
        setter: Some(1),
    });
    module.types.push(base);
    module
}

/// The target type matching [`TargetSignature::default`]: one flag field of
/// type `BinderFlags`, the flag property with an auto-shaped setter, and two
/// constructors with a single return each. The base type lives in
/// `base_module_name`, referenced externally.
pub fn target_module(base_module_name: &str) -> Module {
    let mut module = Module::new("Microsoft.CodeAnalysis.CSharp.dll");
    let base = module.add_extern_module(base_module_name);

    let mut options = TypeDef::new("Microsoft.CodeAnalysis.CSharp", "CSharpCompilationOptions");
    options.base = Some(TypeRef::External {
        module: base,
        namespace: "Microsoft.CodeAnalysis".into(),
        name: "CompilationOptions".into(),
    });
    options.fields.push(Field {
        name: "_topLevelBinderFlags".into(),
        type_name: "BinderFlags".into(),
    });

    let mut ctor_default = Method::new(".ctor", ctor_flags());
    ctor_default.body.max_stack = 1;
    ctor_default.body.push(OpCode::Ldarg0, Operand::None);
    ctor_default.body.push(OpCode::Pop, Operand::None);
    ctor_default.body.push(OpCode::Ret, Operand::None);

    let mut ctor_flagged = Method::new(".ctor", ctor_flags());
    ctor_flagged.body.max_stack = 2;
    ctor_flagged.body.push(OpCode::Ldarg0, Operand::None);
    ctor_flagged.body.push(OpCode::Ldarg1, Operand::None);
    ctor_flagged
        .body
        .push(OpCode::Stfld, Operand::Token(Token::field(1)));
    ctor_flagged.body.push(OpCode::Ret, Operand::None);

    options.methods.push(ctor_default);
    options.methods.push(ctor_flagged);
    options
        .methods
        .push(auto_setter("set_TopLevelBinderFlags", Token::field(1)));
    options.properties.push(Property {
        name: "TopLevelBinderFlags".into(),
        type_name: "BinderFlags".into(),
        getter: None,
        setter: Some(2),
    });

    module.types.push(options);
    module
}

/// Evaluate an auto-property setter body with `value` on the stack.
///
/// Supports exactly the instruction mix of a (patched) auto-property setter:
/// argument loads, integer constant loads, bitwise operations and the final
/// field store. Returns the value stored into the backing field.
pub fn eval_setter(body: &MethodBody, value: u32) -> u32 {
    let mut stack: Vec<u32> = Vec::new();
    let mut stored = None;

    for instruction in body.instructions() {
        match (instruction.opcode, &instruction.operand) {
            (OpCode::Ldarg0, _) => stack.push(0xDEAD_BEEF), // instance marker
            (OpCode::Ldarg1, _) => stack.push(value),
            (OpCode::LdcI4, Operand::Int32(literal)) => stack.push(*literal as u32),
            (OpCode::LdcI42, _) => stack.push(2),
            (OpCode::Or, _) => {
                let b = stack.pop().unwrap();
                let a = stack.pop().unwrap();
                stack.push(a | b);
            }
            (OpCode::And, _) => {
                let b = stack.pop().unwrap();
                let a = stack.pop().unwrap();
                stack.push(a & b);
            }
            (OpCode::Stfld, _) => {
                let field_value = stack.pop().unwrap();
                let _instance = stack.pop().unwrap();
                stored = Some(field_value);
            }
            (OpCode::Ret, _) => break,
            other => panic!("unsupported instruction in setter body: {other:?}"),
        }
    }

    stored.expect("setter body stored no value")
}
