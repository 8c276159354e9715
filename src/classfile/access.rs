//! Access and property flags for classes, fields and methods (JVMS §4.1, §4.5, §4.6).
//!
//! Unknown bits are preserved (`from_bits_retain`) so re-emitting an untouched member never
//! changes its flags.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Class access and property flags
    pub struct ClassAccess: u16 {
        /// Declared `public`
        const PUBLIC = 0x0001;
        /// Declared `final`
        const FINAL = 0x0010;
        /// Treat superclass methods specially for `invokespecial`
        const SUPER = 0x0020;
        /// Is an interface
        const INTERFACE = 0x0200;
        /// Declared `abstract`
        const ABSTRACT = 0x0400;
        /// Not present in source code
        const SYNTHETIC = 0x1000;
        /// Declared as an annotation interface
        const ANNOTATION = 0x2000;
        /// Declared as an enum class
        const ENUM = 0x4000;
        /// Is a module, not a class or interface
        const MODULE = 0x8000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Field access and property flags
    pub struct FieldAccess: u16 {
        /// Declared `public`
        const PUBLIC = 0x0001;
        /// Declared `private`
        const PRIVATE = 0x0002;
        /// Declared `protected`
        const PROTECTED = 0x0004;
        /// Declared `static`
        const STATIC = 0x0008;
        /// Declared `final`
        const FINAL = 0x0010;
        /// Declared `volatile`
        const VOLATILE = 0x0040;
        /// Declared `transient`
        const TRANSIENT = 0x0080;
        /// Not present in source code
        const SYNTHETIC = 0x1000;
        /// Element of an enum class
        const ENUM = 0x4000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Method access and property flags
    pub struct MethodAccess: u16 {
        /// Declared `public`
        const PUBLIC = 0x0001;
        /// Declared `private`
        const PRIVATE = 0x0002;
        /// Declared `protected`
        const PROTECTED = 0x0004;
        /// Declared `static`
        const STATIC = 0x0008;
        /// Declared `final`
        const FINAL = 0x0010;
        /// Declared `synchronized`
        const SYNCHRONIZED = 0x0020;
        /// Compiler-generated bridge method
        const BRIDGE = 0x0040;
        /// Declared with a variable number of arguments
        const VARARGS = 0x0080;
        /// Declared `native`
        const NATIVE = 0x0100;
        /// Declared `abstract`
        const ABSTRACT = 0x0400;
        /// Declared `strictfp`
        const STRICT = 0x0800;
        /// Not present in source code
        const SYNTHETIC = 0x1000;
    }
}

impl MethodAccess {
    /// Returns `true` if the method has no body (`abstract` or `native`).
    #[must_use]
    pub fn is_bodiless(self) -> bool {
        self.intersects(MethodAccess::ABSTRACT | MethodAccess::NATIVE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_bits_are_retained() {
        let flags = MethodAccess::from_bits_retain(0x8001);
        assert!(flags.contains(MethodAccess::PUBLIC));
        assert_eq!(flags.bits(), 0x8001);
    }

    #[test]
    fn bodiless_methods() {
        assert!(MethodAccess::ABSTRACT.is_bodiless());
        assert!((MethodAccess::PUBLIC | MethodAccess::NATIVE).is_bodiless());
        assert!(!(MethodAccess::PUBLIC | MethodAccess::FINAL).is_bodiless());
    }
}
