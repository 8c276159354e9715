//! Synthetic `java/util/ResourceBundle` images.
//!
//! The image carries the members the rewrite relies on with the shapes of the real class:
//!
//! - `private static getBundleImpl(String, Locale, ClassLoader, ResourceBundle$Control)`
//!   declaring `MissingResourceException`
//! - `public final getObject(String)` calling the abstract `handleGetObject`
//! - `getLocale()` and `getBaseBundleName()` reading instance fields
//!
//! The optional static initializer contains a `tableswitch`, an exception handler, line
//! numbers, a local variable table, stack map frames and a type annotation.

use crate::{
    classfile::{
        access::{ClassAccess, FieldAccess, MethodAccess},
        code::{CodeAttribute, ExceptionEntry},
        constpool::ConstantPool,
        Attribute, ClassFile, FieldInfo, MethodInfo, STACK_MAP_MAJOR_VERSION,
    },
    file::io::push_be,
    Result,
};

const RESOLUTION_DESCRIPTOR: &str = "(Ljava/lang/String;Ljava/util/Locale;Ljava/lang/ClassLoader;Ljava/util/ResourceBundle$Control;)Ljava/util/ResourceBundle;";
const ACCESS_DESCRIPTOR: &str = "(Ljava/lang/String;)Ljava/lang/Object;";
const ARRAY_ACCESS_DESCRIPTOR: &str = "(Ljava/lang/String;)[Ljava/lang/String;";

/// Builds class images shaped like `java/util/ResourceBundle`.
#[derive(Debug, Clone)]
pub struct ClassImageBuilder {
    class_name: String,
    major_version: u16,
    static_init: bool,
    resolution_method: bool,
    duplicate_access_method: bool,
    abstract_access_method: bool,
    array_access_method: bool,
}

impl ClassImageBuilder {
    /// A Java 17 class file with all target members and no static initializer.
    pub fn bundle() -> Self {
        ClassImageBuilder {
            class_name: "java/util/ResourceBundle".to_string(),
            major_version: 61,
            static_init: false,
            resolution_method: true,
            duplicate_access_method: false,
            abstract_access_method: false,
            array_access_method: false,
        }
    }

    pub fn with_class_name(mut self, class_name: &str) -> Self {
        self.class_name = class_name.to_string();
        self
    }

    pub fn with_version(mut self, major_version: u16) -> Self {
        self.major_version = major_version;
        self
    }

    pub fn with_static_init(mut self) -> Self {
        self.static_init = true;
        self
    }

    pub fn without_resolution_method(mut self) -> Self {
        self.resolution_method = false;
        self
    }

    /// Adds an overload `getObject(Object)`.
    pub fn with_duplicate_access_method(mut self) -> Self {
        self.duplicate_access_method = true;
        self
    }

    /// Declares `getObject` abstract, without code.
    pub fn with_abstract_access_method(mut self) -> Self {
        self.abstract_access_method = true;
        self
    }

    /// Declares `getObject` returning `String[]`.
    pub fn with_array_access_method(mut self) -> Self {
        self.array_access_method = true;
        self
    }

    pub fn build(&self) -> Result<Vec<u8>> {
        let mut pool = ConstantPool::new();
        let this_class = pool.class(&self.class_name)?;
        let super_class = pool.class("java/lang/Object")?;

        let fields = vec![
            FieldInfo {
                access: FieldAccess::PROTECTED,
                name_index: pool.utf8("locale")?,
                descriptor_index: pool.utf8("Ljava/util/Locale;")?,
                attributes: Vec::new(),
            },
            FieldInfo {
                access: FieldAccess::PRIVATE,
                name_index: pool.utf8("name")?,
                descriptor_index: pool.utf8("Ljava/lang/String;")?,
                attributes: Vec::new(),
            },
        ];

        let mut methods = Vec::new();

        let object_init = pool.method_ref("java/lang/Object", "<init>", "()V")?;
        methods.push(method(
            &mut pool,
            MethodAccess::PUBLIC,
            "<init>",
            "()V",
            Some(code(1, 1, [&[0x2A, 0xB7][..], &u2(object_init)[..], &[0xB1][..]].concat())),
            Vec::new(),
        )?);

        if self.resolution_method {
            let exceptions = exceptions(&mut pool, "java/util/MissingResourceException")?;
            methods.push(method(
                &mut pool,
                MethodAccess::PRIVATE | MethodAccess::STATIC,
                "getBundleImpl",
                RESOLUTION_DESCRIPTOR,
                // aconst_null, areturn
                Some(code(1, 4, vec![0x01, 0xB0])),
                vec![exceptions],
            )?);
        }

        let handle = pool.method_ref(&self.class_name, "handleGetObject", ACCESS_DESCRIPTOR)?;
        if self.abstract_access_method {
            methods.push(method(
                &mut pool,
                MethodAccess::PUBLIC | MethodAccess::ABSTRACT,
                "getObject",
                ACCESS_DESCRIPTOR,
                None,
                Vec::new(),
            )?);
        } else if self.array_access_method {
            methods.push(method(
                &mut pool,
                MethodAccess::PUBLIC | MethodAccess::FINAL,
                "getObject",
                ARRAY_ACCESS_DESCRIPTOR,
                // aconst_null, areturn
                Some(code(1, 2, vec![0x01, 0xB0])),
                Vec::new(),
            )?);
        } else {
            methods.push(method(
                &mut pool,
                MethodAccess::PUBLIC | MethodAccess::FINAL,
                "getObject",
                ACCESS_DESCRIPTOR,
                // aload_0, aload_1, invokevirtual handleGetObject, areturn
                Some(code(2, 2, [&[0x2A, 0x2B, 0xB6][..], &u2(handle)[..], &[0xB0][..]].concat())),
                Vec::new(),
            )?);
        }
        if self.duplicate_access_method {
            methods.push(method(
                &mut pool,
                MethodAccess::PUBLIC,
                "getObject",
                "(Ljava/lang/Object;)Ljava/lang/Object;",
                // aload_1, areturn
                Some(code(1, 2, vec![0x2B, 0xB0])),
                Vec::new(),
            )?);
        }

        methods.push(method(
            &mut pool,
            MethodAccess::PROTECTED | MethodAccess::ABSTRACT,
            "handleGetObject",
            ACCESS_DESCRIPTOR,
            None,
            Vec::new(),
        )?);

        let locale = pool.field_ref(&self.class_name, "locale", "Ljava/util/Locale;")?;
        methods.push(method(
            &mut pool,
            MethodAccess::PUBLIC,
            "getLocale",
            "()Ljava/util/Locale;",
            Some(code(1, 1, [&[0x2A, 0xB4][..], &u2(locale)[..], &[0xB0][..]].concat())),
            Vec::new(),
        )?);

        let name = pool.field_ref(&self.class_name, "name", "Ljava/lang/String;")?;
        methods.push(method(
            &mut pool,
            MethodAccess::PUBLIC,
            "getBaseBundleName",
            "()Ljava/lang/String;",
            Some(code(1, 1, [&[0x2A, 0xB4][..], &u2(name)[..], &[0xB0][..]].concat())),
            Vec::new(),
        )?);

        if self.static_init {
            let initializer = static_initializer(&mut pool, self.major_version)?;
            methods.push(method(
                &mut pool,
                MethodAccess::STATIC,
                "<clinit>",
                "()V",
                Some(initializer),
                Vec::new(),
            )?);
        }

        let mut source = Vec::new();
        push_be(&mut source, pool.utf8("ResourceBundle.java")?);
        let attributes = vec![Attribute {
            name_index: pool.utf8("SourceFile")?,
            info: source,
        }];

        ClassFile {
            minor_version: 0,
            major_version: self.major_version,
            constant_pool: pool,
            access: ClassAccess::PUBLIC | ClassAccess::SUPER | ClassAccess::ABSTRACT,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields,
            methods,
            attributes,
        }
        .to_bytes()
    }
}

fn u2(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

fn code(max_stack: u16, max_locals: u16, code: Vec<u8>) -> CodeAttribute {
    CodeAttribute {
        max_stack,
        max_locals,
        code,
        exception_table: Vec::new(),
        attributes: Vec::new(),
    }
}

fn method(
    pool: &mut ConstantPool,
    access: MethodAccess,
    name: &str,
    descriptor: &str,
    code: Option<CodeAttribute>,
    attributes: Vec<Attribute>,
) -> Result<MethodInfo> {
    let mut method = MethodInfo {
        access,
        name_index: pool.utf8(name)?,
        descriptor_index: pool.utf8(descriptor)?,
        attributes: Vec::new(),
    };
    if let Some(code) = code {
        method.set_code(pool, &code)?;
    }
    method.attributes.extend(attributes);
    Ok(method)
}

fn exceptions(pool: &mut ConstantPool, class: &str) -> Result<Attribute> {
    let mut info = Vec::new();
    push_be(&mut info, 1u16);
    push_be(&mut info, pool.class(class)?);
    Ok(Attribute {
        name_index: pool.utf8("Exceptions")?,
        info,
    })
}

/// ```text
///  0: iconst_1
///  1: istore_0
///  2: iload_0
///  3: tableswitch 0..=1 { 0 -> 24, 1 -> 29, default -> 32 }
/// 24: iconst_0
/// 25: istore_0
/// 26: goto 32
/// 29: aconst_null
/// 30: athrow            // [29, 31) -> 31 NullPointerException
/// 31: pop
/// 32: return
/// ```
fn static_initializer(pool: &mut ConstantPool, major_version: u16) -> Result<CodeAttribute> {
    let code = vec![
        0x04, 0x3B, 0x1A, 0xAA, // iconst_1, istore_0, iload_0, tableswitch
        0x00, 0x00, 0x00, 0x1D, // default +29
        0x00, 0x00, 0x00, 0x00, // low
        0x00, 0x00, 0x00, 0x01, // high
        0x00, 0x00, 0x00, 0x15, // 0: +21
        0x00, 0x00, 0x00, 0x1A, // 1: +26
        0x03, 0x3B, 0xA7, 0x00, 0x06, // iconst_0, istore_0, goto +6
        0x01, 0xBF, // aconst_null, athrow
        0x57, // pop
        0xB1, // return
    ];

    let npe = pool.class("java/lang/NullPointerException")?;
    let mut attributes = Vec::new();

    let mut lines = Vec::new();
    push_be(&mut lines, 4u16);
    for (pc, line) in [(0u16, 100u16), (24, 101), (29, 102), (32, 103)] {
        push_be(&mut lines, pc);
        push_be(&mut lines, line);
    }
    attributes.push(Attribute {
        name_index: pool.utf8("LineNumberTable")?,
        info: lines,
    });

    let mut locals = Vec::new();
    push_be(&mut locals, 1u16);
    push_be(&mut locals, 2u16);
    push_be(&mut locals, 31u16);
    push_be(&mut locals, pool.utf8("mode")?);
    push_be(&mut locals, pool.utf8("I")?);
    push_be(&mut locals, 0u16);
    attributes.push(Attribute {
        name_index: pool.utf8("LocalVariableTable")?,
        info: locals,
    });

    if major_version >= STACK_MAP_MAJOR_VERSION {
        let mut frames = vec![
            0x00, 0x04, // 4 frames
            0xFC, 0x00, 0x18, 0x01, // 24: append int
            0x04, // 29: same
            0x41, 0x07, // 31: same locals, NullPointerException on the stack
        ];
        push_be(&mut frames, npe);
        frames.push(0x00); // 32: same
        attributes.push(Attribute {
            name_index: pool.utf8("StackMapTable")?,
            info: frames,
        });
    }

    attributes.push(Attribute {
        name_index: pool.utf8("RuntimeVisibleTypeAnnotations")?,
        info: vec![0x00, 0x00],
    });

    Ok(CodeAttribute {
        max_stack: 1,
        max_locals: 1,
        code,
        exception_table: vec![ExceptionEntry {
            start_pc: 29,
            end_pc: 31,
            handler_pc: 31,
            catch_type: npe,
        }],
        attributes,
    })
}
